//! Config and check command implementations

use colored::Colorize;
use ocvpn_core::config::{normalize_gateway, toml_config};
use ocvpn_core::error::OcvpnError;

/// Print the configuration file path, or the effective configuration
pub fn run_config(path_only: bool) -> Result<(), OcvpnError> {
    let path = toml_config::get_config_path()?;
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    let config = toml_config::load_config()?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults (no config file)".to_string()
    };

    println!("{} {}", "Configuration:".bold(), source);
    let gateway = if config.gateway.is_empty() {
        "(not set)".dimmed().to_string()
    } else {
        config.gateway.clone()
    };
    println!("  gateway:            {}", gateway);
    println!("  loop timeout:       {}s", config.loop_timeout_secs);
    println!("  reconnect interval: {}s", config.reconnect_interval_secs);
    match config.dtls_attempt_period() {
        Some(period) => println!("  dtls attempt:       {}s", period.as_secs()),
        None => println!("  dtls attempt:       {}", "disabled".yellow()),
    }
    println!("  mtu floor:          {}", config.mtu_floor);
    Ok(())
}

/// Validate a gateway address
pub fn run_check(gateway: &str) -> Result<(), OcvpnError> {
    let gateway = normalize_gateway(gateway)?;
    println!("{} {}", "valid gateway:".green().bold(), gateway);
    Ok(())
}
