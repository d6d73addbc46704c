//! Error types for the ocvpn session core
//!
//! This module defines all error types used throughout the crate,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the ocvpn crates
#[derive(Error, Debug)]
pub enum OcvpnError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to VPN state handling and engine setup
    #[error("VPN error: {0}")]
    Vpn(#[from] VpnError),

    /// Fatal errors of a single connection attempt
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Malformed address, route or DNS entries
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Credential hand-off errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid VPN gateway address: {target:?}")]
    InvalidGateway { target: String },

    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// VPN state and engine setup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VpnError {
    #[error("Invalid connection state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Tunnel engine initialisation failed with code {code}")]
    EngineInit { code: i32 },

    #[error("Session service is not running")]
    ServiceUnavailable,
}

/// Errors that end a single connection attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to create tunnel engine: {reason}")]
    EngineCreation { reason: String },

    #[error("Gateway address rejected by the tunnel engine (code {code})")]
    TargetRejected { code: i32 },

    #[error("Unknown error while obtaining cookie from VPN (code {code})")]
    AuthenticationFailed { code: i32 },

    #[error("User aborted authentication")]
    AuthenticationAborted,

    #[error("Error when establishing CSTP connection (code {code})")]
    ChannelEstablishment { code: i32 },

    #[error("Tunnel engine reported no IP configuration")]
    MissingIpConfig,

    #[error("Error setting up tunnel device: {reason}")]
    TunnelSetup { reason: String },

    #[error("Session cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] VpnError),
}

/// Malformed network parameters; always recovered by skipping the entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid address {value:?}")]
    InvalidAddress { value: String },

    #[error("invalid netmask {value:?}")]
    InvalidMask { value: String },

    #[error("invalid prefix length {value:?}")]
    InvalidPrefix { value: String },

    #[error("ADDRESS: skipping invalid interface address {entry}")]
    InvalidInterfaceAddress { entry: String },

    #[error("ROUTE: skipping invalid route {entry}")]
    InvalidSubnet { entry: String },

    #[error("DNS: skipping invalid server {entry}")]
    InvalidDnsServer { entry: String },
}

/// Credential hand-off errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("A credential request is already pending")]
    RequestPending,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, OcvpnError>;
