//! Bundled configuration factories and their typed views.
//!
//! Each `create_*_config` helper wraps a caller-supplied producer with the
//! defaults and normalization hook of one subtree, so tests and embedders can
//! swap the producer while keeping the shape guarantees.

use super::{ConfigError, ConfigFactory, ConfigResult, Configure, EnvBinding, EnvKind};
use super::{deep_merge, MergeMode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

pub const APP_KEY: &str = "app";
pub const DATABASE_KEY: &str = "database";
pub const SEARCH_KEY: &str = "search";
pub const CONTENT_KEY: &str = "content";

pub const DEFAULT_CONNECTION: &str = "default";
pub const DEFAULT_SEARCH_INDEX: &str = "content";

pub const APP_ENV_BINDINGS: &[EnvBinding] = &[
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
        var: "APP_URL",
        key: "url",
        kind: EnvKind::Text,
        default: None,
    },
    EnvBinding {
        var: "APP_PREFIX",
        key: "prefix",
        kind: EnvKind::Text,
        default: Some("api"),
    },
];

pub const DATABASE_ENV_BINDINGS: &[EnvBinding] = &[
    EnvBinding {
        var: "DB_PATH",
        key: "connections.0.path",
        kind: EnvKind::Text,
        default: Some("quillpress.db"),
    },
    EnvBinding {
        var: "DB_BUSY_TIMEOUT_MS",
        key: "common.busy_timeout_ms",
        kind: EnvKind::Integer,
        default: None,
    },
];

pub const CONTENT_ENV_BINDINGS: &[EnvBinding] = &[
    EnvBinding {
        var: "CONTENT_SEARCH_TYPE",
        key: "search_type",
        kind: EnvKind::Text,
        default: None,
    },
    EnvBinding {
        var: "CONTENT_HTML_ENABLED",
        key: "html_enabled",
        kind: EnvKind::Bool,
        default: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub url: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConnectionConfig {
    pub name: String,
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connections: Vec<DbConnectionConfig>,
}

impl DatabaseConfig {
    pub fn connection(&self, name: &str) -> Option<&DbConnectionConfig> {
        self.connections.iter().find(|connection| connection.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConnectionConfig {
    pub name: String,
    pub index: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// SQL `LIKE` scan over post columns.
    Like,
    /// Full-text document index.
    #[default]
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub html_enabled: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::Index,
            html_enabled: false,
        }
    }
}

/// The factories `create_app` registers unless told otherwise.
pub fn default_factories() -> Vec<(String, ConfigFactory)> {
    vec![
        (APP_KEY.to_string(), create_app_config(env_register(APP_ENV_BINDINGS))),
        (
            DATABASE_KEY.to_string(),
            create_db_config(|configure: &Configure| {
                let mut value = json!({ "connections": [{ "name": DEFAULT_CONNECTION }] });
                configure
                    .env()
                    .apply_bindings(DATABASE_ENV_BINDINGS, &mut value)?;
                Ok(value)
            }),
        ),
        (
            SEARCH_KEY.to_string(),
            create_search_config(|_: &Configure| Ok(json!({}))),
        ),
        (
            CONTENT_KEY.to_string(),
            create_content_config(env_register(CONTENT_ENV_BINDINGS)),
        ),
    ]
}

/// Producer that reads only the given environment bindings.
pub fn env_register(
    bindings: &'static [EnvBinding],
) -> impl Fn(&Configure) -> ConfigResult<Value> + 'static {
    move |configure: &Configure| {
        let mut value = Value::Object(Map::new());
        configure.env().apply_bindings(bindings, &mut value)?;
        Ok(value)
    }
}

/// `app` subtree: derives `url` from host and port when it is not set.
pub fn create_app_config(
    register: impl Fn(&Configure) -> ConfigResult<Value> + 'static,
) -> ConfigFactory {
    ConfigFactory::new(register)
        .with_default(|_: &Configure| {
            Ok(json!({ "host": "127.0.0.1", "port": 3000, "prefix": "api" }))
        })
        .with_hook(|_: &Configure, mut value: Value| {
            let host = value.get("host").and_then(Value::as_str).unwrap_or("127.0.0.1").to_string();
            let port = value.get("port").and_then(Value::as_u64).unwrap_or(3000);
            let object = object_mut(APP_KEY, &mut value)?;
            if !object.get("url").is_some_and(Value::is_string) {
                object.insert("url".to_string(), json!(format!("http://{host}:{port}")));
            }
            if let Some(prefix) = object.get("prefix").and_then(Value::as_str) {
                let trimmed = prefix.trim_matches('/').to_string();
                object.insert("prefix".to_string(), Value::String(trimmed));
            }
            Ok(value)
        })
}

/// `database` subtree: merges `common` into every entry of `connections`.
pub fn create_db_config(
    register: impl Fn(&Configure) -> ConfigResult<Value> + 'static,
) -> ConfigFactory {
    ConfigFactory::new(register)
        .with_default(|_: &Configure| {
            Ok(json!({
                "common": { "busy_timeout_ms": default_busy_timeout_ms() },
                "connections": []
            }))
        })
        .with_hook(|_: &Configure, mut value: Value| {
            let object = object_mut(DATABASE_KEY, &mut value)?;
            let common = object.get("common").cloned().unwrap_or_else(|| json!({}));
            let connections = match object.remove("connections") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(invalid(DATABASE_KEY, "connections must be a list")),
            };

            let merged = connections
                .into_iter()
                .enumerate()
                .map(|(index, connection)| {
                    let mut connection = deep_merge(common.clone(), connection, MergeMode::Replace);
                    ensure_name(&mut connection, index);
                    connection
                })
                .collect::<Vec<_>>();
            ensure_unique_names(DATABASE_KEY, &merged)?;

            object.insert("connections".to_string(), Value::Array(merged));
            Ok(value)
        })
}

/// `search` subtree: normalizes one or many index connections into a list.
pub fn create_search_config(
    register: impl Fn(&Configure) -> ConfigResult<Value> + 'static,
) -> ConfigFactory {
    ConfigFactory::new(register).with_hook(|_: &Configure, value: Value| {
        let connections = match value {
            Value::Array(items) => items,
            Value::Object(map) if map.is_empty() => vec![json!({})],
            Value::Object(map) => vec![Value::Object(map)],
            Value::Null => vec![json!({})],
            _ => return Err(invalid(SEARCH_KEY, "expected a connection or a list of them")),
        };

        let normalized = connections
            .into_iter()
            .enumerate()
            .map(|(index, connection)| {
                let mut connection = deep_merge(
                    json!({ "index": DEFAULT_SEARCH_INDEX }),
                    connection,
                    MergeMode::Replace,
                );
                ensure_name(&mut connection, index);
                connection
            })
            .collect::<Vec<_>>();
        ensure_unique_names(SEARCH_KEY, &normalized)?;
        Ok(Value::Array(normalized))
    })
}

/// `content` subtree: validates the search strategy.
pub fn create_content_config(
    register: impl Fn(&Configure) -> ConfigResult<Value> + 'static,
) -> ConfigFactory {
    ConfigFactory::new(register)
        .with_default(|_: &Configure| Ok(json!({ "search_type": "index", "html_enabled": false })))
        .with_hook(|_: &Configure, value: Value| {
            ContentConfig::deserialize(&value).map_err(|err| invalid(CONTENT_KEY, &err.to_string()))?;
            Ok(value)
        })
}

fn object_mut<'a>(key: &str, value: &'a mut Value) -> ConfigResult<&'a mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| invalid(key, "expected a mapping"))
}

fn ensure_name(connection: &mut Value, index: usize) {
    let Some(object) = connection.as_object_mut() else {
        return;
    };
    let named = object
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !named {
        let name = if index == 0 {
            DEFAULT_CONNECTION.to_string()
        } else {
            format!("connection_{index}")
        };
        object.insert("name".to_string(), Value::String(name));
    }
}

fn ensure_unique_names(key: &str, connections: &[Value]) -> ConfigResult<()> {
    let mut seen = BTreeSet::new();
    for connection in connections {
        let name = connection
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(key, "connection entries must be mappings"))?;
        if !seen.insert(name) {
            return Err(invalid(key, &format!("duplicate connection name `{name}`")));
        }
    }
    Ok(())
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
