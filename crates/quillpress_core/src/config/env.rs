//! Environment snapshot used by configuration factories.
//!
//! # Responsibility
//! - Capture process variables plus optional `.env` / `.env.{APP_ENV}` files.
//! - Offer typed lookups with fallback defaults.
//! - Map environment variables onto dotted config keys via static tables.
//!
//! # Invariants
//! - Loading never mutates the process environment.
//! - Process variables win over `.env.{APP_ENV}`, which wins over `.env`.

use super::path::set_path;
use super::{ConfigError, ConfigResult};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

const RUN_ENV_VAR: &str = "APP_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunEnv {
    #[default]
    Development,
    Production,
    Test,
}

impl RunEnv {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// How an [`EnvBinding`] value is converted before it lands in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    Text,
    Integer,
    Bool,
}

/// Static mapping from one environment variable to one dotted config key.
#[derive(Debug, Clone, Copy)]
pub struct EnvBinding {
    pub var: &'static str,
    pub key: &'static str,
    pub kind: EnvKind,
    /// Value used when the variable is unset. `None` leaves the key untouched.
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct Env {
    run_env: RunEnv,
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Loads the environment relative to the current working directory.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from_dir(Path::new("."))
    }

    /// Loads process variables plus `.env` files found in `dir`.
    pub fn load_from_dir(dir: &Path) -> ConfigResult<Self> {
        let process: BTreeMap<String, String> = std::env::vars().collect();

        let mut vars = read_env_file(&dir.join(".env"))?;
        let run_env = process
            .get(RUN_ENV_VAR)
            .or_else(|| vars.get(RUN_ENV_VAR))
            .and_then(|value| RunEnv::parse(value))
            .unwrap_or_default();

        let scoped = read_env_file(&dir.join(format!(".env.{}", run_env.as_str())))?;
        vars.extend(scoped);
        vars.extend(process);

        info!(
            "event=env_load module=config status=ok run_env={} vars={}",
            run_env.as_str(),
            vars.len()
        );
        Ok(Self { run_env, vars })
    }

    /// Builds an environment from explicit pairs, ignoring the process.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let run_env = vars
            .get(RUN_ENV_VAR)
            .and_then(|value| RunEnv::parse(value))
            .unwrap_or_default();
        Self { run_env, vars }
    }

    pub fn run_env(&self) -> RunEnv {
        self.run_env
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Parses `name` as `T`, falling back to `default` when unset or blank.
    pub fn parse_or<T>(&self, name: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name).map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::InvalidValue {
                key: name.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Writes every binding into `target`, converting values by kind.
    pub fn apply_bindings(&self, bindings: &[EnvBinding], target: &mut Value) -> ConfigResult<()> {
        for binding in bindings {
            let Some(raw) = self.get(binding.var).or(binding.default) else {
                continue;
            };
            let value = convert(binding, raw)?;
            set_path(target, binding.key, value);
        }
        Ok(())
    }
}

fn read_env_file(path: &Path) -> ConfigResult<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    if !path.is_file() {
        return Ok(vars);
    }

    let parse_error = |err: dotenvy::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    for item in dotenvy::from_path_iter(path).map_err(parse_error)? {
        let (key, value) = item.map_err(parse_error)?;
        vars.insert(key, value);
    }

    debug!(
        "event=env_file module=config status=ok path={} vars={}",
        path.display(),
        vars.len()
    );
    Ok(vars)
}

fn convert(binding: &EnvBinding, raw: &str) -> ConfigResult<Value> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: binding.var.to_string(),
        message,
    };
    match binding.kind {
        EnvKind::Text => Ok(Value::String(raw.to_string())),
        EnvKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|err| invalid(err.to_string())),
        EnvKind::Bool => parse_flag(raw)
            .map(Value::Bool)
            .ok_or_else(|| invalid(format!("`{raw}` is not a boolean"))),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Env, EnvBinding, EnvKind, RunEnv};
    use crate::config::ConfigError;
    use serde_json::json;
    use std::fs;

    const BINDINGS: &[EnvBinding] = &[
        EnvBinding {
            var: "APP_HOST",
            key: "host",
            kind: EnvKind::Text,
            default: Some("127.0.0.1"),
        },
        EnvBinding {
            var: "APP_PORT",
            key: "port",
            kind: EnvKind::Integer,
            default: Some("3000"),
        },
        EnvBinding {
            var: "APP_DEBUG",
            key: "flags.debug",
            kind: EnvKind::Bool,
            default: None,
        },
    ];

    #[test]
    fn typed_lookups_fall_back_to_defaults() {
        let env = Env::from_vars([("PORT", "8080"), ("BLANK", " ")]);
        assert_eq!(env.parse_or("PORT", 1u16).unwrap(), 8080);
        assert_eq!(env.parse_or("BLANK", 7u16).unwrap(), 7);
        assert_eq!(env.parse_or("MISSING", 9u16).unwrap(), 9);
        assert_eq!(env.get_or("MISSING", "x"), "x");
    }

    #[test]
    fn parse_failure_is_invalid_value() {
        let env = Env::from_vars([("PORT", "abc")]);
        assert!(matches!(
            env.parse_or("PORT", 1u16),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn bindings_convert_by_kind() {
        let env = Env::from_vars([("APP_PORT", "4000"), ("APP_DEBUG", "yes")]);
        let mut value = json!({});
        env.apply_bindings(BINDINGS, &mut value).unwrap();
        assert_eq!(
            value,
            json!({"host": "127.0.0.1", "port": 4000, "flags": {"debug": true}})
        );
    }

    #[test]
    fn unset_binding_without_default_is_skipped() {
        let env = Env::from_vars(Vec::<(String, String)>::new());
        let mut value = json!({});
        env.apply_bindings(&BINDINGS[2..], &mut value).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn run_env_reads_app_env() {
        assert_eq!(Env::from_vars([("APP_ENV", "prod")]).run_env(), RunEnv::Production);
        assert_eq!(
            Env::from_vars([("APP_ENV", "unknown")]).run_env(),
            RunEnv::Development
        );
    }

    #[test]
    fn env_files_layer_by_run_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "QP_ENV_FILE_TEST_A=base\nQP_ENV_FILE_TEST_B=base\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".env.development"),
            "QP_ENV_FILE_TEST_B=scoped\n",
        )
        .unwrap();

        let env = Env::load_from_dir(dir.path()).unwrap();
        assert_eq!(env.get("QP_ENV_FILE_TEST_A"), Some("base"));
        if env.run_env() == RunEnv::Development {
            assert_eq!(env.get("QP_ENV_FILE_TEST_B"), Some("scoped"));
        }
    }
}
