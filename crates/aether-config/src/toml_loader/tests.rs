//! Tests for TOML config loading and first-run seeding.

use super::*;
use aether_common::ConfigError;
use std::path::Path;

fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn missing_file_is_file_not_found() {
    let err = load_from_path(Path::new("/tmp/nonexistent_aether_config.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn partial_file_keeps_defaults() {
    let (_dir, path) = write_config(
        r#"
[model]
model = "local-model"
base_url = "http://localhost:11434/v1"

[rate_limit]
per_minute = 20
"#,
    );

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.model.model, "local-model");
    assert_eq!(config.model.base_url, "http://localhost:11434/v1");
    assert_eq!(config.rate_limit.per_minute, 20);
    assert_eq!(config.rate_limit.per_hour, 50);
    assert_eq!(config.server.port, 8000);
}

#[test]
fn malformed_toml_names_the_file() {
    let (_dir, path) = write_config("this is not valid toml {{{");

    match load_from_path(&path).unwrap_err() {
        ConfigError::ParseError(msg) => assert!(msg.contains("config.toml"), "{msg}"),
        other => panic!("expected ParseError, got {other:?}"),
    }
}

#[test]
fn out_of_range_iterations_fail_validation() {
    let (_dir, path) = write_config("[engine]\nmax_iterations = 99\n");

    match load_from_path(&path).unwrap_err() {
        ConfigError::ValidationError(msg) => {
            assert!(msg.contains("max_iterations"), "{msg}");
            assert!(msg.contains("config.toml"), "{msg}");
        }
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

#[test]
fn parse_config_rejects_zero_rate_limit() {
    let err = parse_config("[rate_limit]\nper_minute = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn first_run_seeds_template_then_loads_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aether").join("config.toml");

    let config = load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.engine.max_iterations, 5);

    let reloaded = load_or_create(&path).unwrap();
    assert_eq!(reloaded.model.model, "gpt-4.1-nano");
}

#[test]
fn edited_config_survives_load_or_create() {
    let (_dir, path) = write_config("[server]\nport = 9100\n");

    let config = load_or_create(&path).unwrap();
    assert_eq!(config.server.port, 9100);
}

#[test]
fn template_parses_and_validates() {
    use super::template::default_config_toml;

    let config = parse_config(&default_config_toml()).unwrap();
    assert_eq!(config.rate_limit.per_day, 250);
}
