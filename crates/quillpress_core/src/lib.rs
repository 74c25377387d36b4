//! Core domain logic for Quillpress.
//! This crate is the single source of truth for tree, configuration and
//! content invariants.

pub mod app;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use app::{create_app, App, AppError, AppOptions, AppResult};
pub use config::{ConfigError, ConfigFactory, ConfigResult, Configure, Env, StorageOptions};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use repo::{RepoError, RepoResult};
pub use search::{SearchError, SearchResult};
pub use service::{DataService, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
