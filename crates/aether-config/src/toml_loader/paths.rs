//! Where `config.toml` lives, and seeding it on first run.

use aether_common::ConfigError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::template::default_config_toml;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "AETHER_CONFIG";

const APP_DIR: &str = "aether";
const FILE_NAME: &str = "config.toml";

/// `$AETHER_CONFIG` if set and non-empty, else `<config dir>/aether/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    resolve_config_path(std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from), dirs::config_dir())
}

fn resolve_config_path(
    override_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        debug!(path = %path.display(), "config path taken from {CONFIG_PATH_ENV}");
        return Ok(path);
    }
    config_dir
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| {
            ConfigError::ParseError(format!(
                "no platform config directory; set {CONFIG_PATH_ENV} to a config file path"
            ))
        })
}

/// Write the commented template to `path` unless a file is already there.
///
/// Returns `true` when the template was written. An existing file is never
/// replaced, so two servers starting together cannot clobber an edited config.
pub fn create_default_config(path: &Path) -> Result<bool, ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(ConfigError::ParseError(format!("cannot create {}: {e}", path.display())))
        }
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| ConfigError::ParseError(format!("cannot write {}: {e}", path.display())))?;

    info!(path = %path.display(), "wrote default config");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_platform_dir() {
        let path = resolve_config_path(
            Some(PathBuf::from("/srv/aether.toml")),
            Some(PathBuf::from("/home/re/.config")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/srv/aether.toml"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let path =
            resolve_config_path(Some(PathBuf::new()), Some(PathBuf::from("/home/re/.config")))
                .unwrap();
        assert_eq!(path, PathBuf::from("/home/re/.config/aether/config.toml"));
    }

    #[test]
    fn no_config_dir_names_the_override() {
        let err = resolve_config_path(None, None).unwrap_err();
        assert!(err.to_string().contains(CONFIG_PATH_ENV));
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9001\n").unwrap();

        assert!(!create_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[server]\nport = 9001\n");
    }
}
