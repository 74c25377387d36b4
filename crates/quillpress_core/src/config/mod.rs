//! Layered configuration engine.
//!
//! # Responsibility
//! - Read the process environment and the persisted override file.
//! - Materialize named configuration factories lazily and exactly once.
//! - Merge defaults, hooks and persisted overrides into one in-memory tree.
//!
//! # Invariants
//! - Every configuration subtree is a `serde_json::Value`.
//! - Configuration errors are fatal for bootstrap and never swallowed here.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

mod configure;
mod env;
pub mod factories;
mod merge;
pub mod path;
mod storage;

pub use configure::{ConfigFactory, Configure, IntoConfigFactory, StorageFlag};
pub use env::{Env, EnvBinding, EnvKind, RunEnv};
pub use merge::{deep_merge, MergeMode};
pub use storage::{ConfigStorage, StorageOptions, DEFAULT_STORAGE_FILE};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    /// `store` was called while the persisted storage is disabled.
    StorageDisabled,
    /// A required configuration subtree is absent after initialization.
    MissingConfig(String),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    /// A factory producer failed.
    Register {
        key: String,
        message: String,
    },
    /// A factory read its own key while being materialized.
    CircularFactory(String),
    InvalidValue {
        key: String,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageDisabled => write!(f, "config storage is disabled"),
            Self::MissingConfig(key) => write!(f, "missing required config `{key}`"),
            Self::Io { path, source } => {
                write!(f, "config file error at {}: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "invalid config file {}: {message}", path.display())
            }
            Self::Register { key, message } => {
                write!(f, "config factory `{key}` failed: {message}")
            }
            Self::CircularFactory(key) => {
                write!(f, "config factory `{key}` depends on itself")
            }
            Self::InvalidValue { key, message } => {
                write!(f, "invalid config value for `{key}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
