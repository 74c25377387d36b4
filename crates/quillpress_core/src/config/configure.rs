//! Memoizing resolver for named configuration factories.
//!
//! # Responsibility
//! - Register factories and materialize each of them at most once.
//! - Combine `default_register`, `register`, `hook` and persisted overrides.
//! - Route `set`/`remove`/`store` through the persisted storage when asked.
//!
//! # Invariants
//! - Once a key is materialized its factory is not invoked again until the
//!   key is removed.
//! - `has` never materializes a factory; `get` may.
//! - A factory reading its own key while materializing fails with
//!   `ConfigError::CircularFactory` instead of recursing.
//! - The engine is single-threaded (`RefCell` state); share it by reference.

use super::env::Env;
use super::merge::{deep_merge, MergeMode};
use super::path::{get_path, has_path, is_prefix_key, remove_path, set_path};
use super::storage::{ConfigStorage, StorageOptions};
use super::{ConfigError, ConfigResult};
use log::{error, info};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Instant;

type Producer = Rc<dyn Fn(&Configure) -> ConfigResult<Value>>;
type Hook = Rc<dyn Fn(&Configure, Value) -> ConfigResult<Value>>;

/// Lazy producer of one configuration subtree.
#[derive(Clone)]
pub struct ConfigFactory {
    register: Producer,
    default_register: Option<Producer>,
    hook: Option<Hook>,
    storage: bool,
    append: bool,
}

impl ConfigFactory {
    pub fn new(register: impl Fn(&Configure) -> ConfigResult<Value> + 'static) -> Self {
        Self {
            register: Rc::new(register),
            default_register: None,
            hook: None,
            storage: false,
            append: false,
        }
    }

    /// Defaults that `register` output is merged over (`register` wins).
    pub fn with_default(
        mut self,
        default_register: impl Fn(&Configure) -> ConfigResult<Value> + 'static,
    ) -> Self {
        self.default_register = Some(Rc::new(default_register));
        self
    }

    /// Final transformation applied after the default merge.
    pub fn with_hook(
        mut self,
        hook: impl Fn(&Configure, Value) -> ConfigResult<Value> + 'static,
    ) -> Self {
        self.hook = Some(Rc::new(hook));
        self
    }

    /// Persists the first materialized value and merges stored overrides.
    pub fn with_storage(mut self, storage: bool) -> Self {
        self.storage = storage;
        self
    }

    /// Uses [`MergeMode::Merge`] instead of `Replace` for stored overrides.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

/// Conversion accepted by [`Configure::add`]: a bare producer or a factory.
pub trait IntoConfigFactory {
    fn into_factory(self) -> ConfigFactory;
}

impl IntoConfigFactory for ConfigFactory {
    fn into_factory(self) -> ConfigFactory {
        self
    }
}

impl<F> IntoConfigFactory for F
where
    F: Fn(&Configure) -> ConfigResult<Value> + 'static,
{
    fn into_factory(self) -> ConfigFactory {
        ConfigFactory::new(self)
    }
}

/// Persistence request for [`Configure::set`].
///
/// `change` forces the incoming value over whatever is already stored;
/// without it, stored objects and arrays keep precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageFlag {
    pub enabled: bool,
    pub change: bool,
}

impl StorageFlag {
    pub fn change() -> Self {
        Self {
            enabled: true,
            change: true,
        }
    }
}

impl From<bool> for StorageFlag {
    fn from(enabled: bool) -> Self {
        Self {
            enabled,
            change: false,
        }
    }
}

pub struct Configure {
    initialized: bool,
    env: Env,
    storage: RefCell<ConfigStorage>,
    factories: RefCell<BTreeMap<String, Rc<ConfigFactory>>>,
    config: RefCell<Value>,
    resolving: RefCell<BTreeSet<String>>,
}

impl Default for Configure {
    fn default() -> Self {
        Self::new()
    }
}

impl Configure {
    /// Creates an uninitialized engine with an empty environment and
    /// disabled storage.
    pub fn new() -> Self {
        Self {
            initialized: false,
            env: Env::default(),
            storage: RefCell::new(ConfigStorage::default()),
            factories: RefCell::new(BTreeMap::new()),
            config: RefCell::new(Value::Object(Map::new())),
            resolving: RefCell::new(BTreeSet::new()),
        }
    }

    /// Loads the process environment, then behaves like
    /// [`Configure::initialize_with_env`].
    pub fn initialize<I, K, F>(&mut self, factories: I, options: &StorageOptions) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoConfigFactory,
    {
        if self.initialized {
            return Ok(());
        }
        let env = Env::load()?;
        self.initialize_with_env(env, factories, options)
    }

    /// Builds storage, registers `factories` and syncs every one of them.
    ///
    /// Calls after the first successful one are no-ops.
    pub fn initialize_with_env<I, K, F>(
        &mut self,
        env: Env,
        factories: I,
        options: &StorageOptions,
    ) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoConfigFactory,
    {
        if self.initialized {
            return Ok(());
        }
        let started_at = Instant::now();

        self.env = env;
        *self.storage.get_mut() = ConfigStorage::new(options)?;
        for (key, factory) in factories {
            self.add(key, factory);
        }
        self.sync(None)?;

        self.initialized = true;
        info!(
            "event=config_init module=config status=ok factories={} storage={} duration_ms={}",
            self.factories.borrow().len(),
            self.storage.borrow().enabled(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn storage_enabled(&self) -> bool {
        self.storage.borrow().enabled()
    }

    /// Snapshot of the whole materialized tree.
    pub fn all(&self) -> Value {
        self.config.borrow().clone()
    }

    /// Returns the value at `key`.
    ///
    /// When the key is absent and no default is given, the factory owning
    /// `key` (registered under `key` or one of its dotted prefixes) is
    /// materialized once before the lookup is retried.
    pub fn get(&self, key: &str, default: Option<Value>) -> ConfigResult<Option<Value>> {
        if let Some(value) = self.lookup(key) {
            return Ok(Some(value));
        }
        if default.is_some() {
            return Ok(default);
        }
        match self.factory_key_for(key) {
            Some(factory_key) => {
                self.sync_factory(&factory_key)?;
                Ok(self.lookup(key))
            }
            None => Ok(None),
        }
    }

    /// Typed variant of [`Configure::get`].
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>> {
        match self.get(key, None)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: err.to_string(),
                }),
        }
    }

    /// Checks materialized config only.
    pub fn has(&self, key: &str) -> bool {
        has_path(&self.config.borrow(), key)
    }

    /// Sets `key`, optionally persisting it when storage is enabled.
    pub fn set(
        &self,
        key: &str,
        value: Value,
        storage: impl Into<StorageFlag>,
        append: bool,
    ) -> ConfigResult<()> {
        let flag = storage.into();
        if flag.enabled && self.storage_enabled() {
            return self.change_storage_value(key, value, flag.change, append);
        }
        set_path(&mut self.config.borrow_mut(), key, value);
        Ok(())
    }

    /// Registers a factory. Materialized keys are not affected until removed.
    pub fn add(&self, key: impl Into<String>, factory: impl IntoConfigFactory) {
        self.factories
            .borrow_mut()
            .insert(key.into(), Rc::new(factory.into_factory()));
    }

    /// Removes `key` from config, and from storage when it is persisted.
    ///
    /// A persisted key owned by a factory re-derives that factory's subtree.
    pub fn remove(&self, key: &str) -> ConfigResult<()> {
        let stored = {
            let storage = self.storage.borrow();
            storage.enabled() && storage.has(key)
        };
        if !stored {
            remove_path(&mut self.config.borrow_mut(), key);
            return Ok(());
        }

        self.storage.borrow_mut().remove(key)?;
        match self.owning_factory(key) {
            Some(factory_key) => {
                remove_path(&mut self.config.borrow_mut(), &factory_key);
                self.sync_factory(&factory_key)
            }
            None => {
                remove_path(&mut self.config.borrow_mut(), key);
                Ok(())
            }
        }
    }

    /// Materializes one factory, or every registered factory when `key` is
    /// `None`. Already materialized keys are skipped.
    pub fn sync(&self, key: Option<&str>) -> ConfigResult<()> {
        match key {
            Some(key) => self.sync_factory(key),
            None => {
                let keys: Vec<String> = self.factories.borrow().keys().cloned().collect();
                for key in keys {
                    self.sync_factory(&key)?;
                }
                Ok(())
            }
        }
    }

    /// Persists the current value of `key`.
    pub fn store(&self, key: &str, change: bool, append: bool) -> ConfigResult<()> {
        if !self.storage_enabled() {
            return Err(ConfigError::StorageDisabled);
        }
        let value = self.get(key, None)?.unwrap_or(Value::Null);
        self.change_storage_value(key, value, change, append)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        get_path(&self.config.borrow(), key).cloned()
    }

    /// Longest registered factory key that is `key` or a dotted prefix of it.
    fn factory_key_for(&self, key: &str) -> Option<String> {
        self.factories
            .borrow()
            .keys()
            .filter(|factory_key| is_prefix_key(factory_key, key))
            .max_by_key(|factory_key| factory_key.len())
            .cloned()
    }

    /// Factory whose subtree contains `key` or is contained by it.
    fn owning_factory(&self, key: &str) -> Option<String> {
        self.factory_key_for(key).or_else(|| {
            self.factories
                .borrow()
                .keys()
                .find(|factory_key| is_prefix_key(key, factory_key))
                .cloned()
        })
    }

    fn sync_factory(&self, key: &str) -> ConfigResult<()> {
        if self.has(key) {
            return Ok(());
        }
        let Some(factory) = self.factories.borrow().get(key).cloned() else {
            return Ok(());
        };
        if !self.resolving.borrow_mut().insert(key.to_string()) {
            return Err(ConfigError::CircularFactory(key.to_string()));
        }

        let started_at = Instant::now();
        let result = self.materialize(key, &factory);
        self.resolving.borrow_mut().remove(key);

        match result {
            Ok(()) => {
                info!(
                    "event=config_sync module=config status=ok key={} storage={} duration_ms={}",
                    key,
                    factory.storage,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=config_sync module=config status=error key={} duration_ms={} error={}",
                    key,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn materialize(&self, key: &str, factory: &ConfigFactory) -> ConfigResult<()> {
        let mut value = (factory.register)(self)?;
        if let Some(default_register) = &factory.default_register {
            let defaults = default_register(self)?;
            value = deep_merge(defaults, value, MergeMode::Replace);
        }
        if let Some(hook) = &factory.hook {
            value = hook(self, value)?;
        }

        let stored = {
            let storage = self.storage.borrow();
            if storage.enabled() {
                storage.get(key).cloned()
            } else {
                None
            }
        };
        let persist = factory.storage && stored.is_none();
        if let Some(stored) = stored {
            value = deep_merge(value, stored, MergeMode::from_append(factory.append));
        }

        self.set(key, value, persist, factory.append)
    }

    fn change_storage_value(
        &self,
        key: &str,
        value: Value,
        change: bool,
        append: bool,
    ) -> ConfigResult<()> {
        let mode = MergeMode::from_append(append);
        let resolved = {
            let mut storage = self.storage.borrow_mut();
            match storage.get(key).cloned() {
                Some(existing) if !change => {
                    if existing.is_object() || existing.is_array() {
                        storage.set(key, deep_merge(value, existing, mode))?;
                    }
                }
                _ => storage.set(key, value)?,
            }
            storage.get(key).cloned().unwrap_or(Value::Null)
        };

        set_path(&mut self.config.borrow_mut(), key, resolved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigFactory, Configure, StorageFlag};
    use crate::config::{ConfigError, ConfigResult, Env, StorageOptions};
    use serde_json::{json, Value};

    fn empty_env() -> Env {
        Env::from_vars(Vec::<(String, String)>::new())
    }

    #[test]
    fn self_referencing_factory_is_rejected() {
        let mut configure = Configure::new();
        let factories = vec![(
            "loop",
            ConfigFactory::new(|configure: &Configure| {
                Ok(configure.get("loop.inner", None)?.unwrap_or(Value::Null))
            }),
        )];

        let result = configure.initialize_with_env(empty_env(), factories, &StorageOptions::default());
        assert!(matches!(result, Err(ConfigError::CircularFactory(key)) if key == "loop"));
    }

    #[test]
    fn factories_can_read_each_other() {
        let mut configure = Configure::new();
        let factories = vec![
            (
                "a_url",
                ConfigFactory::new(|configure: &Configure| {
                    let port = configure.get("z_port", None)?.unwrap_or(Value::Null);
                    Ok(json!(format!("http://localhost:{port}")))
                }),
            ),
            ("z_port", ConfigFactory::new(|_: &Configure| Ok(json!(8080)))),
        ];
        configure
            .initialize_with_env(empty_env(), factories, &StorageOptions::default())
            .unwrap();

        assert_eq!(
            configure.get("a_url", None).unwrap(),
            Some(json!("http://localhost:8080"))
        );
    }

    #[test]
    fn explicit_default_skips_materialization() {
        let configure = Configure::new();
        configure.add("lazy", |_: &Configure| -> ConfigResult<Value> { Ok(json!(1)) });

        assert_eq!(configure.get("lazy", Some(json!(0))).unwrap(), Some(json!(0)));
        assert!(!configure.has("lazy"));
        assert_eq!(configure.get("lazy", None).unwrap(), Some(json!(1)));
    }

    #[test]
    fn storage_flag_from_bool_does_not_force_change() {
        assert_eq!(
            StorageFlag::from(true),
            StorageFlag {
                enabled: true,
                change: false
            }
        );
        assert!(StorageFlag::change().change);
    }
}
