//! Routes command implementation
//!
//! Reads the IP parameters a gateway would report and prints the
//! directives the host would apply to the tunnel interface.

use colored::Colorize;
use ocvpn_core::config::toml_config;
use ocvpn_core::error::{ConfigError, OcvpnError};
use ocvpn_core::vpn::{IpConfig, RouteConfigBuilder, RoutePlan};
use serde_json::json;
use std::path::Path;
use tracing::debug;

/// Run the routes command
pub fn run_routes(file: &Path, as_json: bool, mtu_floor: Option<u32>) -> Result<(), OcvpnError> {
    let ip = read_ip_config(file)?;

    let mtu_floor = match mtu_floor {
        Some(floor) => floor,
        None => toml_config::load_config()?.mtu_floor,
    };
    debug!("Building route plan with MTU floor {}", mtu_floor);

    let plan = RouteConfigBuilder::new(mtu_floor).build(&ip);

    if as_json {
        print_json(&plan)
    } else {
        print_plan(&plan);
        Ok(())
    }
}

fn read_ip_config(file: &Path) -> Result<IpConfig, OcvpnError> {
    let contents = std::fs::read_to_string(file)?;

    if file.extension().map_or(false, |ext| ext == "json") {
        serde_json::from_str(&contents).map_err(|e| {
            OcvpnError::Config(ConfigError::ValidationError {
                message: format!("Failed to parse {}: {}", file.display(), e),
            })
        })
    } else {
        Ok(toml::from_str(&contents)?)
    }
}

fn print_plan(plan: &RoutePlan) {
    for directive in &plan.directives {
        println!("{}", directive);
    }

    if !plan.skipped.is_empty() {
        eprintln!();
        for skipped in &plan.skipped {
            eprintln!("{} {}", "warning:".yellow().bold(), skipped);
        }
    }
}

fn print_json(plan: &RoutePlan) -> Result<(), OcvpnError> {
    let skipped: Vec<String> = plan.skipped.iter().map(ToString::to_string).collect();
    let document = json!({
        "directives": plan.directives,
        "skipped": skipped,
    });

    let rendered = serde_json::to_string_pretty(&document).map_err(|e| {
        OcvpnError::Config(ConfigError::ValidationError {
            message: format!("Failed to render route plan: {}", e),
        })
    })?;
    println!("{}", rendered);
    Ok(())
}
