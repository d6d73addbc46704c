//! Cidr command implementation

use colored::Colorize;
use ocvpn_core::error::OcvpnError;
use ocvpn_core::vpn::Cidr;

/// Print the normalized form of an IPv4 network
pub fn run_cidr(network: &str, mask: Option<&str>) -> Result<(), OcvpnError> {
    let cidr = match mask {
        Some(mask) => Cidr::with_mask(network, mask)?,
        None if network.contains('/') => network.parse::<Cidr>()?,
        None => Cidr::parse_combined(&format!("{}/32", network.trim()))?,
    };

    println!("{}", cidr.to_string().bold());
    println!("  network: {}", cidr.network());
    println!("  netmask: {}", cidr.netmask());
    println!("  prefix:  {}", cidr.prefix_len());
    Ok(())
}
