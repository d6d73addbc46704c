//! Configuration module
//!
//! Session tuning parameters and gateway address validation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod toml_config;

/// Minimum MTU accepted for the tunnel interface (IPv6 minimum link MTU)
pub const DEFAULT_MTU_FLOOR: u32 = 1280;

/// Session configuration structure
///
/// Contains the gateway and the timing knobs handed to the tunnel engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// VPN gateway hostname or URL
    #[serde(default)]
    pub gateway: String,

    /// Timeout handed to every packet-loop step, in seconds
    #[serde(default = "default_loop_timeout")]
    pub loop_timeout_secs: u64,

    /// Minimum interval between engine reconnect attempts, in seconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// DTLS attempt period in seconds (0 disables DTLS)
    #[serde(default = "default_dtls_attempt_period")]
    pub dtls_attempt_period_secs: u64,

    /// Lower bound for the tunnel MTU
    #[serde(default = "default_mtu_floor")]
    pub mtu_floor: u32,
}

fn default_loop_timeout() -> u64 {
    300
}
fn default_reconnect_interval() -> u64 {
    10
}
fn default_dtls_attempt_period() -> u64 {
    60
}
fn default_mtu_floor() -> u32 {
    DEFAULT_MTU_FLOOR
}

impl SessionConfig {
    /// Create a new configuration for a gateway with default timings
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            ..Self::default()
        }
    }

    /// Poll timeout for one packet-loop step
    pub fn loop_timeout(&self) -> Duration {
        Duration::from_secs(self.loop_timeout_secs)
    }

    /// Minimum reconnect interval for one packet-loop step
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    /// DTLS attempt period, `None` when DTLS is disabled
    pub fn dtls_attempt_period(&self) -> Option<Duration> {
        (self.dtls_attempt_period_secs > 0).then(|| Duration::from_secs(self.dtls_attempt_period_secs))
    }

    /// Validate the configuration
    ///
    /// An empty gateway is allowed here; it is supplied at start time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gateway.trim().is_empty() {
            normalize_gateway(&self.gateway)?;
        }

        if self.loop_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "loop_timeout_secs cannot be zero".to_string(),
            });
        }

        if self.reconnect_interval_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "reconnect_interval_secs cannot be zero".to_string(),
            });
        }

        if self.mtu_floor < 576 {
            return Err(ConfigError::ValidationError {
                message: format!("mtu_floor must be at least 576, got {}", self.mtu_floor),
            });
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway: String::new(),
            loop_timeout_secs: default_loop_timeout(),
            reconnect_interval_secs: default_reconnect_interval(),
            dtls_attempt_period_secs: default_dtls_attempt_period(),
            mtu_floor: default_mtu_floor(),
        }
    }
}

/// Validate a gateway target and return it trimmed
///
/// Blank targets and targets that do not parse as a URL with a host
/// (after assuming `https://` when no scheme is given) are rejected.
pub fn normalize_gateway(target: &str) -> Result<String, ConfigError> {
    let trimmed = target.trim();
    let invalid = || ConfigError::InvalidGateway {
        target: target.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = url::Url::parse(&candidate).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(invalid()),
    }
}
