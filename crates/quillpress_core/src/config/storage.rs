//! File-backed persisted configuration overrides.
//!
//! # Responsibility
//! - Load the override file once at construction.
//! - Rewrite the whole file after every mutation.
//!
//! # Invariants
//! - A disabled storage never touches the filesystem.
//! - The file is read as YAML (JSON is valid YAML) and written as
//!   pretty-printed JSON with a 4-space indent.
//! - The in-memory root is always a JSON object.

use super::path::{get_path, has_path, remove_path, set_path};
use super::{ConfigError, ConfigResult};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub enabled: bool,
    /// Override file location. Defaults to `./config.yaml`.
    pub path: Option<PathBuf>,
}

impl StorageOptions {
    pub fn enabled_at(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: Some(path.into()),
        }
    }
}

#[derive(Debug)]
pub struct ConfigStorage {
    enabled: bool,
    path: PathBuf,
    config: Value,
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(DEFAULT_STORAGE_FILE),
            config: Value::Object(Map::new()),
        }
    }
}

impl ConfigStorage {
    /// Builds the storage; when enabled, ensures the file exists and loads it.
    pub fn new(options: &StorageOptions) -> ConfigResult<Self> {
        let path = options
            .path
            .clone()
            .unwrap_or_else(|| Path::new(".").join(DEFAULT_STORAGE_FILE));
        if !options.enabled {
            return Ok(Self {
                enabled: false,
                path,
                ..Self::default()
            });
        }

        ensure_file(&path)?;
        let config = read_file(&path)?;
        info!(
            "event=storage_load module=config status=ok path={} keys={}",
            path.display(),
            config.as_object().map_or(0, Map::len)
        );
        Ok(Self {
            enabled: true,
            path,
            config,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        get_path(&self.config, key)
    }

    pub fn has(&self, key: &str) -> bool {
        has_path(&self.config, key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<()> {
        if !self.enabled {
            return Err(ConfigError::StorageDisabled);
        }
        set_path(&mut self.config, key, value);
        self.write()
    }

    pub fn remove(&mut self, key: &str) -> ConfigResult<()> {
        if !self.enabled {
            return Err(ConfigError::StorageDisabled);
        }
        if remove_path(&mut self.config, key).is_some() {
            self.write()?;
        }
        Ok(())
    }

    fn write(&self) -> ConfigResult<()> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.config
            .serialize(&mut serializer)
            .map_err(|err| ConfigError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
        buffer.push(b'\n');

        fs::write(&self.path, buffer).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(
            "event=storage_write module=config status=ok path={}",
            self.path.display()
        );
        Ok(())
    }
}

fn ensure_file(path: &Path) -> ConfigResult<()> {
    if path.is_file() {
        return Ok(());
    }
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, b"").map_err(io_error)
}

fn read_file(path: &Path) -> ConfigResult<Value> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let parsed: Value = serde_yaml::from_str(&raw).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    match parsed {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(parsed),
        _ => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "root must be a mapping".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigStorage, StorageOptions};
    use crate::config::ConfigError;
    use serde_json::json;
    use std::fs;

    #[test]
    fn disabled_storage_never_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut storage = ConfigStorage::new(&StorageOptions {
            enabled: false,
            path: Some(path.clone()),
        })
        .unwrap();

        assert!(!storage.enabled());
        assert!(matches!(
            storage.set("x", json!(1)),
            Err(ConfigError::StorageDisabled)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn enabled_storage_creates_missing_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let storage = ConfigStorage::new(&StorageOptions::enabled_at(&path)).unwrap();

        assert!(path.is_file());
        assert_eq!(storage.config(), &json!({}));
    }

    #[test]
    fn reads_yaml_and_writes_indented_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "app:\n  port: 3000\n").unwrap();

        let mut storage = ConfigStorage::new(&StorageOptions::enabled_at(&path)).unwrap();
        assert_eq!(storage.get("app.port"), Some(&json!(3000)));

        storage.set("app.host", json!("localhost")).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n    \"app\": {"));
        assert!(written.contains("\n        \"host\": \"localhost\""));

        let reloaded = ConfigStorage::new(&StorageOptions::enabled_at(&path)).unwrap();
        assert_eq!(
            reloaded.config(),
            &json!({"app": {"port": 3000, "host": "localhost"}})
        );
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "- a\n- b\n").unwrap();

        assert!(matches!(
            ConfigStorage::new(&StorageOptions::enabled_at(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
