//! IPv4 CIDR parsing and mask normalization
//!
//! Gateways report netmasks both as dotted quads and as prefix lengths,
//! and split-include subnets frequently carry host bits. Everything here
//! normalizes to a network address plus prefix length. Masks that are
//! not a contiguous run of ones fall back to `/32`, the most restrictive
//! choice, instead of failing.

use crate::error::RouteError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 network in address/prefix-length form
///
/// `network` always has its host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

/// Convert a mask to the number of leading one bits
///
/// Returns 32 for masks that are not a contiguous prefix.
pub fn mask_to_prefix_len(mask: Ipv4Addr) -> u8 {
    // Sentinel bit 32 keeps the shift loop finite for 0.0.0.0.
    let mut value = u64::from(u32::from(mask)) + (1u64 << 32);
    let mut zeros = 0u32;
    while value & 1 == 0 {
        zeros += 1;
        value >>= 1;
    }

    if value != (0x1_ffff_ffffu64 >> zeros) {
        32
    } else {
        (32 - zeros) as u8
    }
}

/// Parse a dotted mask string and convert it to a prefix length
pub fn parse_dotted_mask(mask: &str) -> Result<u8, RouteError> {
    let mask = parse_ipv4(mask).map_err(|_| RouteError::InvalidMask {
        value: mask.to_string(),
    })?;
    Ok(mask_to_prefix_len(mask))
}

/// Mask with `prefix_len` leading one bits
pub fn prefix_len_to_mask(prefix_len: u8) -> Ipv4Addr {
    let prefix_len = prefix_len.min(32);
    if prefix_len == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(u32::MAX << (32 - u32::from(prefix_len)))
    }
}

fn parse_ipv4(value: &str) -> Result<Ipv4Addr, RouteError> {
    value.trim().parse().map_err(|_| RouteError::InvalidAddress {
        value: value.to_string(),
    })
}

fn parse_prefix_or_mask(value: &str) -> Result<u8, RouteError> {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        // Overflowing digit strings are just another out-of-range length.
        return Ok(match value.parse::<u32>() {
            Ok(len) if len <= 32 => len as u8,
            _ => 32,
        });
    }
    parse_dotted_mask(value)
}

impl Cidr {
    /// Build a network from an address and prefix length
    ///
    /// Prefix lengths above 32 are clamped to 32; host bits are cleared.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = if prefix_len > 32 { 32 } else { prefix_len };
        let network = Ipv4Addr::from(u32::from(address) & u32::from(prefix_len_to_mask(prefix_len)));
        Self {
            network,
            prefix_len,
        }
    }

    /// Build a network from an address and a dotted mask string
    pub fn with_mask(address: &str, mask: &str) -> Result<Self, RouteError> {
        let address = parse_ipv4(address)?;
        Ok(Self::new(address, parse_dotted_mask(mask)?))
    }

    /// Parse `addr/prefix` or `addr/dotted.mask`
    pub fn parse_combined(spec: &str) -> Result<Self, RouteError> {
        let (address, mask) = spec.split_once('/').ok_or_else(|| RouteError::InvalidPrefix {
            value: spec.to_string(),
        })?;
        let prefix_len = parse_prefix_or_mask(mask)?;
        Ok(Self::new(parse_ipv4(address)?, prefix_len))
    }

    /// The normalized network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Number of leading one bits in the mask
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// The dotted netmask for this prefix length
    pub fn netmask(&self) -> Ipv4Addr {
        prefix_len_to_mask(self.prefix_len)
    }

    /// Whether `address` falls inside this network
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & u32::from(self.netmask()) == u32::from(self.network)
    }
}

impl FromStr for Cidr {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_combined(s)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
