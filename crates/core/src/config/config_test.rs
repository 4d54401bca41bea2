use std::io::Write;

use tempfile::NamedTempFile;

use super::*;
use crate::logging::LogFormat;
use crate::models::DispatchMode;

const SAMPLE_TOML: &str = r#"
[group]
name = "renderers"
scatter = true
auto_purge = true
dispatch_mode = "dynamic"

[dispatcher]
buffer_size = 2
thread_pool_ratio = 2
extra_threads = 1
pool_name = "renderers"

[observability]
log_level = "debug"
log_format = "json"
metrics_enabled = false
"#;

#[test]
fn test_from_toml() {
    let config = AppConfig::from_toml(SAMPLE_TOML).unwrap();

    assert_eq!(config.group.name, "renderers");
    assert!(config.group.scatter);
    assert!(!config.group.unique_serialization);
    assert!(config.group.auto_purge);
    assert_eq!(config.group.dispatch_mode, DispatchMode::Dynamic);
    assert_eq!(config.dispatcher.buffer_size, 2);
    assert_eq!(config.dispatcher.pool_size_for(5), 4);
    assert_eq!(config.observability.log_format, LogFormat::Json);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = AppConfig::from_toml("[group]\nauto_purge = true\n").unwrap();

    assert!(config.group.auto_purge);
    assert_eq!(config.group.name, "default");
    assert_eq!(config.dispatcher, DispatcherConfig::default());
}

#[test]
fn test_partial_observability_section_uses_defaults() {
    let config = AppConfig::from_toml("[observability]\nlog_level = \"debug\"\n").unwrap();

    assert_eq!(config.observability.log_level, "debug");
    assert_eq!(config.observability.log_format, LogFormat::Pretty);
    assert!(config.observability.metrics_enabled);
}

#[test]
fn test_toml_roundtrip_preserves_config() {
    let config = AppConfig::from_toml(SAMPLE_TOML).unwrap();
    let rendered = config.to_toml().unwrap();

    assert_eq!(AppConfig::from_toml(&rendered).unwrap(), config);
}

#[test]
fn test_invalid_ratio_rejected() {
    let result = AppConfig::from_toml("[dispatcher]\nthread_pool_ratio = 0\n");
    assert!(result.is_err());
}

#[test]
fn test_invalid_dispatch_mode_rejected() {
    let result = AppConfig::from_toml("[group]\ndispatch_mode = \"fastest\"\n");
    assert!(result.is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_TOML.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.group.name, "renderers");
    assert_eq!(config.dispatcher.extra_threads, 1);
    assert!(!config.observability.metrics_enabled);
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/groupcall.toml"));
    assert!(result.is_err());
}
