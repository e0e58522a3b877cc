//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

#[test]
fn default_config_validates() {
    assert!(validate(&AetherConfig::default()).is_ok());
}

#[test]
fn catches_zero_iterations() {
    let mut config = AetherConfig::default();
    config.engine.max_iterations = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("engine.max_iterations"));
}

#[test]
fn catches_temperature_out_of_range() {
    let mut config = AetherConfig::default();
    config.model.temperature = 3.5;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("model.temperature"));
}

#[test]
fn catches_shrinking_rate_windows() {
    let mut config = AetherConfig::default();
    config.rate_limit.per_hour = 2;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must not shrink"));
}

#[test]
fn catches_empty_model_name() {
    let mut config = AetherConfig::default();
    config.model.model = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("model.model must not be empty"));
}

#[test]
fn catches_min_matches_above_keyword_count() {
    let mut config = AetherConfig::default();
    config.engine.intent_keywords = vec!["analyze".into()];
    config.engine.intent_min_matches = 2;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("engine.intent_min_matches"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = AetherConfig::default();
    config.server.port = 0;
    config.session.timeout_hours = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("server.port"));
    assert!(err.contains("session.timeout_hours"));
    assert!(err.contains("; "));
}
