use taskgrid::{EngineConfig, PriorityStrategy};
use tempfile::NamedTempFile;

#[test]
fn config_round_trips_through_a_file() {
    let mut original = EngineConfig::default();
    original.scheduler.max_concurrent_tasks = 6;
    original.scheduler.strategy = PriorityStrategy::ResourceAware;
    original
        .scheduler
        .resources
        .insert("cpu".to_string(), 16.0);
    original.parallel.call_timeout_ms = 5_000;

    let temp_file = NamedTempFile::new().expect("should create a temporary file");
    original
        .to_toml_file(temp_file.path())
        .expect("should save config to file");

    let loaded = EngineConfig::from_toml_file(temp_file.path()).expect("should load config back");
    assert_eq!(loaded.scheduler.max_concurrent_tasks, 6);
    assert_eq!(loaded.scheduler.strategy, PriorityStrategy::ResourceAware);
    assert_eq!(loaded.scheduler.resources.get("cpu"), Some(&16.0));
    assert_eq!(loaded.parallel.call_timeout_ms, 5_000);
}

#[test]
fn missing_file_is_an_error() {
    let err = EngineConfig::from_toml_file("/nonexistent/taskgrid.toml").unwrap_err();
    assert!(err.to_string().contains("reading configuration"));
}

#[test]
fn scheduler_built_from_config_defaults() {
    let config = EngineConfig::from_toml_str("").expect("empty config should use defaults");
    assert_eq!(config.scheduler.max_concurrent_tasks, 3);
    assert_eq!(config.scheduler.history_limit, 256);
    assert_eq!(config.scheduler.strategy, PriorityStrategy::Simple);
    assert_eq!(config.scheduler.retry.base_delay_ms, 500);
}
