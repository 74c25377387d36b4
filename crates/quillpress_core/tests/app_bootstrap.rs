use quillpress_core::config::factories::{default_factories, SearchType, APP_KEY};
use quillpress_core::config::{ConfigError, Env, StorageOptions};
use quillpress_core::db::migrations::{latest_version, schema_version};
use quillpress_core::model::{CreatePost, CreateTag};
use quillpress_core::service::SearchOptions;
use quillpress_core::{create_app, AppError, AppOptions, DataService};

fn options(vars: &[(&str, &str)]) -> AppOptions {
    AppOptions {
        env: Some(Env::from_vars(vars.iter().copied())),
        ..AppOptions::default()
    }
}

#[test]
fn in_memory_app_boots_with_defaults() {
    let app = create_app(options(&[("DB_PATH", ":memory:")])).unwrap();

    assert!(app.configure().is_initialized());
    assert_eq!(schema_version(app.conn()).unwrap(), latest_version());
    assert_eq!(app.app_config().url, "http://127.0.0.1:3000");
    assert_eq!(app.app_config().prefix, "api");
    assert_eq!(app.content_config().search_type, SearchType::Index);
    assert_eq!(app.search_index(), "content");

    let snapshot = app.configure().all();
    let keys: Vec<&str> = snapshot
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["app", "content", "database", "search"]);
    assert_eq!(snapshot["app"]["prefix"], "api");
}

#[test]
fn environment_shapes_config() {
    let app = create_app(options(&[
        ("DB_PATH", ":memory:"),
        ("APP_HOST", "0.0.0.0"),
        ("APP_PORT", "8080"),
        ("APP_PREFIX", "/v1/"),
        ("CONTENT_SEARCH_TYPE", "like"),
    ]))
    .unwrap();

    assert_eq!(app.app_config().url, "http://0.0.0.0:8080");
    assert_eq!(app.app_config().port, 8080);
    assert_eq!(app.app_config().prefix, "v1");
    assert_eq!(app.posts().search_type(), SearchType::Like);
    assert!(app.posts().search_service().is_none());
}

#[test]
fn missing_app_config_aborts_startup() {
    let factories = default_factories()
        .into_iter()
        .filter(|(key, _)| key != APP_KEY)
        .collect();
    let result = create_app(AppOptions {
        factories,
        ..options(&[("DB_PATH", ":memory:")])
    });

    match result {
        Err(AppError::Config(ConfigError::MissingConfig(key))) => assert_eq!(key, "app"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("startup should fail without app config"),
    }
}

#[test]
fn invalid_search_type_aborts_startup() {
    let result = create_app(options(&[
        ("DB_PATH", ":memory:"),
        ("CONTENT_SEARCH_TYPE", "fuzzy"),
    ]));
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[test]
fn database_override_wins_over_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("override.db");
    let result = create_app(AppOptions {
        database_override: Some(path.display().to_string()),
        ..options(&[("DB_PATH", ":memory:")])
    });

    let app = result.unwrap();
    app.tags().create(CreateTag::new("persisted")).unwrap();
    drop(app);
    assert!(path.exists());

    let reopened = create_app(AppOptions {
        database_override: Some(path.display().to_string()),
        ..options(&[])
    })
    .unwrap();
    let tags = reopened.tags().list(&Default::default()).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "persisted");
}

#[test]
fn file_storage_is_created_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let app = create_app(AppOptions {
        storage: StorageOptions::enabled_at(&path),
        ..options(&[("DB_PATH", ":memory:")])
    })
    .unwrap();

    assert!(app.configure().storage_enabled());
    assert!(path.exists());
}

#[test]
fn services_share_the_app_connection() {
    let app = create_app(options(&[("DB_PATH", ":memory:")])).unwrap();

    let post = app.posts().create(CreatePost::new("Hello", "first post")).unwrap();
    let found = app.search().search("hello", &SearchOptions::default()).unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, post.id);
    assert_eq!(app.posts().detail(post.id).unwrap().title, "Hello");
}
