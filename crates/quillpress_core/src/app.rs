//! Application composition root.
//!
//! # Responsibility
//! - Initialize [`Configure`] with the bundled (or caller supplied) factories.
//! - Require the `app` and `database` subtrees and open the default database.
//! - Hand out content services bound to the owned connection.
//!
//! # Invariants
//! - Nothing here is global; every service borrows from one [`App`].
//! - Configuration failures abort startup before the database is touched.

use crate::config::factories::{
    default_factories, AppConfig, ContentConfig, DatabaseConfig, SearchConnectionConfig, APP_KEY,
    CONTENT_KEY, DATABASE_KEY, DEFAULT_CONNECTION, DEFAULT_SEARCH_INDEX, SEARCH_KEY,
};
use crate::config::{ConfigError, ConfigFactory, Configure, Env, StorageOptions};
use crate::db::{open_db_in_memory, open_db_with_busy_timeout, DbError};
use crate::search::SqliteDocumentIndex;
use crate::service::{
    CategoryService, CommentService, PostService, PostServiceOptions, SearchService, TagService,
};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Database path that selects an in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Db(DbError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for AppError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

pub struct AppOptions {
    pub factories: Vec<(String, ConfigFactory)>,
    pub storage: StorageOptions,
    /// Environment to resolve against; `None` loads `.env` files and the
    /// process environment.
    pub env: Option<Env>,
    /// Replaces the configured path of the default connection.
    pub database_override: Option<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            factories: default_factories(),
            storage: StorageOptions::default(),
            env: None,
            database_override: None,
        }
    }
}

pub struct App {
    configure: Configure,
    conn: Connection,
    app: AppConfig,
    content: ContentConfig,
    search_index: String,
}

impl App {
    pub fn configure(&self) -> &Configure {
        &self.configure
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app
    }

    pub fn content_config(&self) -> &ContentConfig {
        &self.content
    }

    /// Name of the document index posts are written to.
    pub fn search_index(&self) -> &str {
        &self.search_index
    }

    pub fn categories(&self) -> CategoryService<'_> {
        CategoryService::new(&self.conn)
    }

    pub fn comments(&self) -> CommentService<'_> {
        CommentService::new(&self.conn)
    }

    pub fn tags(&self) -> TagService<'_> {
        TagService::new(&self.conn)
    }

    pub fn posts(&self) -> PostService<'_> {
        PostService::new(
            &self.conn,
            PostServiceOptions {
                content: self.content,
                index: self.search_index.clone(),
            },
        )
    }

    pub fn search(&self) -> SearchService<'_, SqliteDocumentIndex<'_>> {
        SearchService::new(
            &self.conn,
            SqliteDocumentIndex::new(&self.conn, self.search_index.clone()),
        )
    }
}

/// Builds configuration, opens the default database and returns the app.
pub fn create_app(options: AppOptions) -> AppResult<App> {
    let started_at = Instant::now();
    let result = build_app(options);
    match &result {
        Ok(app) => info!(
            "event=app_create module=app status=ok search_type={:?} duration_ms={}",
            app.content.search_type,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=app_create module=app status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn build_app(options: AppOptions) -> AppResult<App> {
    let AppOptions {
        factories,
        storage,
        env,
        database_override,
    } = options;

    let mut configure = Configure::new();
    let env = match env {
        Some(env) => env,
        None => Env::load()?,
    };
    configure.initialize_with_env(env, factories, &storage)?;

    let app = configure
        .get_as::<AppConfig>(APP_KEY)?
        .ok_or_else(|| ConfigError::MissingConfig(APP_KEY.to_string()))?;
    let database = configure
        .get_as::<DatabaseConfig>(DATABASE_KEY)?
        .ok_or_else(|| ConfigError::MissingConfig(DATABASE_KEY.to_string()))?;
    let connection = database
        .connection(DEFAULT_CONNECTION)
        .ok_or_else(|| {
            ConfigError::MissingConfig(format!("{DATABASE_KEY}.connections.{DEFAULT_CONNECTION}"))
        })?;

    let path = database_override.unwrap_or_else(|| connection.path.clone());
    let conn = if path == MEMORY_DATABASE {
        open_db_in_memory()?
    } else {
        open_db_with_busy_timeout(&path, Duration::from_millis(connection.busy_timeout_ms))?
    };

    let content = configure
        .get_as::<ContentConfig>(CONTENT_KEY)?
        .unwrap_or_default();
    let search_index = configure
        .get_as::<Vec<SearchConnectionConfig>>(SEARCH_KEY)?
        .and_then(|connections| {
            connections
                .iter()
                .find(|connection| connection.name == DEFAULT_CONNECTION)
                .or_else(|| connections.first())
                .map(|connection| connection.index.clone())
        })
        .unwrap_or_else(|| DEFAULT_SEARCH_INDEX.to_string());

    Ok(App {
        configure,
        conn,
        app,
        content,
        search_index,
    })
}
