//! ocvpn - OpenConnect session inspection tool
//!
//! Command-line front end for the ocvpn session core: inspects the
//! session configuration and previews the addresses, routes and DNS
//! settings a tunnel would receive.

use clap::{Parser, Subcommand};
use ocvpn_core::{error::OcvpnError, init_logging};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "ocvpn")]
#[command(about = "OpenConnect session core: configuration and route planning")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an IPv4 network given as addr/prefix or addr mask
    Cidr {
        /// Network in addr/prefix or addr/dotted.mask form, or a bare address
        network: String,
        /// Dotted netmask when the network is a bare address
        mask: Option<String>,
    },
    /// Show the tunnel configuration an IP parameter file would produce
    Routes {
        /// IP parameters as TOML, or JSON when the file ends in .json
        file: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Override the configured MTU floor
        #[arg(long)]
        mtu_floor: Option<u32>,
    },
    /// Show the effective session configuration
    Config {
        /// Only print the configuration file path
        #[arg(long)]
        path: bool,
    },
    /// Validate a gateway address
    Check {
        /// Gateway host name or URL
        gateway: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Commands::Cidr { network, mask } => cli::cidr::run_cidr(&network, mask.as_deref()),
        Commands::Routes {
            file,
            json,
            mtu_floor,
        } => cli::routes::run_routes(&file, json, mtu_floor),
        Commands::Config { path } => cli::config::run_config(path),
        Commands::Check { gateway } => cli::config::run_check(&gateway),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration and input errors (exit code 2)
                OcvpnError::Config(_)
                | OcvpnError::Toml(_)
                | OcvpnError::TomlSerialize(_)
                | OcvpnError::Route(_) => 2,
                // Runtime errors (exit code 1)
                OcvpnError::Vpn(_)
                | OcvpnError::Session(_)
                | OcvpnError::Credential(_)
                | OcvpnError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
