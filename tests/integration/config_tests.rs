use dupesort::config::{Config, ENV_PREFIX};
use figment::providers::Serialized;
use figment::Figment;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

// Environment variables are process-wide
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.workers, 10);
    assert_eq!(config.queue_capacity, 1024);
    assert!(!config.progress);
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("does-not-exist.toml"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
workers = 4
queue_capacity = 64
progress = true
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path);
    assert_eq!(config.workers, 4);
    assert_eq!(config.queue_capacity, 64);
    assert!(config.progress);
}

#[test]
fn test_config_partial_toml_keeps_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 2\n").unwrap();

    let config = Config::load_from_path(&path);
    assert_eq!(config.workers, 2);
    assert_eq!(config.queue_capacity, 1024);
}

#[test]
fn test_config_invalid_toml_falls_back_to_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = \"lots\"\nthis is not toml").unwrap();

    let config = Config::load_from_path(&path);
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_zero_values_are_clamped() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 0\nqueue_capacity = 0\n").unwrap();

    let config = Config::load_from_path(&path);
    assert_eq!(config.workers, 1);
    assert_eq!(config.queue_capacity, 1);
}

#[test]
fn test_config_env_overrides_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 4\nqueue_capacity = 64\n").unwrap();

    std::env::set_var(format!("{ENV_PREFIX}WORKERS"), "12");
    let config = Config::load_from_path(&path);
    std::env::remove_var(format!("{ENV_PREFIX}WORKERS"));

    assert_eq!(config.workers, 12);
    assert_eq!(config.queue_capacity, 64);
}

#[test]
fn test_config_save_and_reload() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/dir/config.toml");

    let config = Config {
        workers: 3,
        queue_capacity: 128,
        progress: true,
    };
    config.save_to_path(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("workers = 3"));
    assert!(content.contains("queue_capacity = 128"));

    let reloaded = Config::load_from_path(&path);
    assert_eq!(reloaded, config);
}

#[test]
fn test_config_default_path_is_toml() {
    if let Some(path) = Config::default_path() {
        assert_eq!(path.file_name().unwrap(), "config.toml");
    }
}
