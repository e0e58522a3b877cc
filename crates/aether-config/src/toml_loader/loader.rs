//! Read, parse and validate `config.toml`.

use crate::schema::AetherConfig;
use crate::validation;
use aether_common::ConfigError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use super::paths::{create_default_config, default_config_path};

/// Parse TOML text and reject out-of-range values.
///
/// Missing sections and fields take their serde defaults.
pub fn parse_config(content: &str) -> Result<AetherConfig, ConfigError> {
    let config: AetherConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load a config file. A missing file is `FileNotFound`; errors from a
/// file that exists are prefixed with its path.
pub fn load_from_path(path: &Path) -> Result<AetherConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("{}: {e}", path.display())),
    })?;

    let config = parse_config(&content).map_err(|e| match e {
        ConfigError::ParseError(msg) => ConfigError::ParseError(format!("{}: {msg}", path.display())),
        ConfigError::ValidationError(msg) => {
            ConfigError::ValidationError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;

    debug!(
        path = %path.display(),
        model = %config.model.model,
        port = config.server.port,
        "config loaded"
    );
    Ok(config)
}

/// Load `path`, seeding it from the template first if it does not exist.
pub fn load_or_create(path: &Path) -> Result<AetherConfig, ConfigError> {
    match load_from_path(path) {
        Err(ConfigError::FileNotFound(_)) => {
            if create_default_config(path)? {
                info!(path = %path.display(), "no config found, using defaults");
            }
            Ok(AetherConfig::default())
        }
        result => result,
    }
}

/// [`load_or_create`] at [`default_config_path`].
pub fn load_default() -> Result<AetherConfig, ConfigError> {
    load_or_create(&default_config_path()?)
}
