//! Quillpress command line entry point.
//!
//! # Responsibility
//! - Start file logging and build the app from the bundled factories.
//! - Print a deterministic status report for local sanity checks.
//!
//! # Invariants
//! - Startup failures exit with a non-zero status and are never swallowed.

use log::error;
use quillpress_core::db::migrations::schema_version;
use quillpress_core::{create_app, default_log_level, init_logging, AppOptions};
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_DIR_VAR: &str = "QUILLPRESS_LOG_DIR";
const LOG_LEVEL_VAR: &str = "QUILLPRESS_LOG_LEVEL";

fn main() -> ExitCode {
    let level = std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| default_log_level().to_string());
    if let Err(err) = init_logging(&level, log_dir()) {
        eprintln!("quillpress: logging disabled: {err}");
    }

    let app = match create_app(AppOptions::default()) {
        Ok(app) => app,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={err}");
            eprintln!("quillpress: startup failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let schema = match schema_version(app.conn()) {
        Ok(version) => version,
        Err(err) => {
            eprintln!("quillpress: cannot read schema version: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("quillpress ping={}", quillpress_core::ping());
    println!("quillpress version={}", quillpress_core::core_version());
    println!("quillpress schema_version={schema}");
    let config_keys = app
        .configure()
        .all()
        .as_object()
        .map(|tree| tree.keys().cloned().collect::<Vec<_>>().join(","))
        .unwrap_or_default();
    println!("quillpress config_keys={config_keys}");
    println!("quillpress url={}", app.app_config().url);
    println!(
        "quillpress search_type={:?} index={}",
        app.content_config().search_type,
        app.search_index()
    );
    ExitCode::SUCCESS
}

fn log_dir() -> PathBuf {
    match std::env::var_os(LOG_DIR_VAR).map(PathBuf::from) {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => std::env::current_dir()
            .map(|cwd| cwd.join(&dir))
            .unwrap_or(dir),
        None => std::env::temp_dir().join("quillpress").join("logs"),
    }
}
