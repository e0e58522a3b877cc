//! AetherRE assistant configuration.
//!
//! TOML-based configuration with full validation. Every section uses
//! `serde(default)` so a partial file (or no file at all) works.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use aether_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("model = {}", config.model.model);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AetherConfig, DataConfig, EngineConfig, LogLevel, LoggingConfig, ModelConfig,
    RateLimitConfig, ServerConfig, SessionConfig, CONFIG_SCHEMA_VERSION,
};

use aether_common::ConfigError;
use std::path::Path;

/// Load config from `$AETHER_CONFIG` or the platform default path,
/// seeding the file from the template when it is missing.
pub fn load_config() -> Result<AetherConfig, ConfigError> {
    toml_loader::load_default()
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<AetherConfig, ConfigError> {
    toml_loader::load_from_path(path)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &AetherConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&AetherConfig::default());
        for section in [
            "\"model\"",
            "\"rate_limit\"",
            "\"session\"",
            "\"engine\"",
            "\"server\"",
            "\"data\"",
            "\"logging\"",
        ] {
            assert!(json.contains(section), "missing {section}");
        }
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn load_config_from_missing_path_is_file_not_found() {
        let err = load_config_from(Path::new("/tmp/nonexistent_aether_config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\nmax_iterations = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
