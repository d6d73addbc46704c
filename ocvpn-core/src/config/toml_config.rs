//! TOML configuration file I/O
//!
//! Handles loading and saving the session configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::SessionConfig;
use crate::error::{ConfigError, OcvpnError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete TOML configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Session settings
    #[serde(rename = "session", default)]
    pub session: SessionConfig,
}

impl TomlConfig {
    /// Create a new TOML configuration
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, OcvpnError> {
        let config: TomlConfig = toml::from_str(contents).map_err(|e| {
            OcvpnError::Config(ConfigError::ValidationError {
                message: format!("Failed to parse config file: {}", e),
            })
        })?;

        config.session.validate()?;
        debug!(
            "Loaded session config: gateway={:?}, loop_timeout={}s, reconnect_interval={}s, dtls_period={}s, mtu_floor={}",
            config.session.gateway,
            config.session.loop_timeout_secs,
            config.session.reconnect_interval_secs,
            config.session.dtls_attempt_period_secs,
            config.session.mtu_floor
        );

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, OcvpnError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OcvpnError::Config(ConfigError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            }),
            _ => OcvpnError::Config(ConfigError::IoError {
                message: format!("Failed to read config file: {}", e),
            }),
        })?;

        Self::from_toml(&contents)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), OcvpnError> {
        self.session.validate()?;

        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OcvpnError::Config(ConfigError::IoError {
                    message: format!("Failed to create config directory: {}", e),
                })
            })?;
        }

        std::fs::write(path, contents).map_err(|_e| {
            OcvpnError::Config(ConfigError::SaveFailed {
                path: path.to_string_lossy().to_string(),
            })
        })?;

        info!("Saved session configuration to {:?}", path);
        Ok(())
    }
}

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/ocvpn, or OCVPN_CONFIG_DIR environment variable if set
pub fn get_config_dir() -> Result<PathBuf, OcvpnError> {
    if let Ok(config_dir) = std::env::var("OCVPN_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        OcvpnError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("ocvpn"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, OcvpnError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the session configuration from the default TOML file
///
/// A missing file yields the default configuration.
pub fn load_config() -> Result<SessionConfig, OcvpnError> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Ok(SessionConfig::default());
    }
    load_config_from_path(&path)
}

/// Load the session configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<SessionConfig, OcvpnError> {
    Ok(TomlConfig::from_file(path.as_ref())?.session)
}

/// Save the session configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(
    config: &SessionConfig,
    path: P,
) -> Result<(), OcvpnError> {
    TomlConfig::new(config.clone()).to_file(path.as_ref())
}
