//! Per-section validators.

use crate::schema::AetherConfig;

use super::helpers::{validate_non_empty, validate_range, validate_range_f64};

pub(crate) fn validate_model(errors: &mut Vec<String>, config: &AetherConfig) {
    let model = &config.model;
    validate_non_empty(errors, "model.base_url", &model.base_url);
    validate_non_empty(errors, "model.model", &model.model);
    validate_non_empty(errors, "model.api_key_env", &model.api_key_env);
    validate_range(errors, "model.max_tokens", model.max_tokens, 16, 32000);
    validate_range_f64(errors, "model.temperature", model.temperature, 0.0, 2.0);
    validate_range(
        errors,
        "model.request_timeout_secs",
        model.request_timeout_secs,
        5,
        600,
    );
}

pub(crate) fn validate_rate_limit(errors: &mut Vec<String>, config: &AetherConfig) {
    let limits = &config.rate_limit;
    validate_range(errors, "rate_limit.per_minute", limits.per_minute, 1, 10_000);
    validate_range(errors, "rate_limit.per_hour", limits.per_hour, 1, 100_000);
    validate_range(errors, "rate_limit.per_day", limits.per_day, 1, 1_000_000);
    if limits.per_hour < limits.per_minute || limits.per_day < limits.per_hour {
        errors.push("rate_limit capacities must not shrink as the window grows".into());
    }
}

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &AetherConfig) {
    validate_range(
        errors,
        "session.timeout_hours",
        config.session.timeout_hours,
        1,
        720,
    );
    validate_range(
        errors,
        "session.reap_interval_secs",
        config.session.reap_interval_secs,
        5,
        3600,
    );
}

pub(crate) fn validate_engine(errors: &mut Vec<String>, config: &AetherConfig) {
    let engine = &config.engine;
    validate_range(errors, "engine.max_iterations", engine.max_iterations, 1, 20);
    validate_range(
        errors,
        "engine.tool_timeout_secs",
        engine.tool_timeout_secs,
        1,
        300,
    );
    validate_range(errors, "engine.event_buffer", engine.event_buffer, 1, 4096);
    if engine.intent_min_matches as usize > engine.intent_keywords.len() {
        errors.push(format!(
            "engine.intent_min_matches = {} exceeds the {} configured keywords",
            engine.intent_min_matches,
            engine.intent_keywords.len()
        ));
    }
}

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &AetherConfig) {
    validate_non_empty(errors, "server.host", &config.server.host);
    validate_range(errors, "server.port", config.server.port, 1, 65535);
}
