//! Route and address configuration from engine-reported IP parameters
//!
//! Turns the gateway's view of the session network (addresses, split
//! includes, DNS) into the directives the host applies to the tunnel
//! interface. A malformed entry never aborts the plan; it is recorded as
//! skipped and the remaining entries are still processed.

use crate::config::DEFAULT_MTU_FLOOR;
use crate::error::RouteError;
use crate::vpn::cidr::{parse_dotted_mask, Cidr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, warn};

/// Network parameters reported by the tunnel engine after the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    /// IPv4 interface address
    pub address: Option<String>,
    /// IPv4 netmask in dotted form
    pub netmask: Option<String>,
    /// IPv6 interface address as `addr/prefix`
    pub address6: Option<String>,
    /// MTU proposed by the gateway
    pub mtu: Option<u32>,
    /// DNS servers
    #[serde(default)]
    pub dns: Vec<String>,
    /// DNS search domain
    pub search_domain: Option<String>,
    /// Split-include subnets
    #[serde(default)]
    pub split_includes: Vec<String>,
}

/// One address, route or resolver setting for the tunnel interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteDirective {
    Address { address: IpAddr, prefix_len: u8 },
    Mtu { mtu: u32 },
    Route { destination: IpAddr, prefix_len: u8 },
    DnsServer { server: IpAddr },
    SearchDomain { domain: String },
}

impl fmt::Display for RouteDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDirective::Address {
                address,
                prefix_len,
            } => write!(f, "address {}/{}", address, prefix_len),
            RouteDirective::Mtu { mtu } => write!(f, "mtu {}", mtu),
            RouteDirective::Route {
                destination,
                prefix_len,
            } => write!(f, "route {}/{}", destination, prefix_len),
            RouteDirective::DnsServer { server } => write!(f, "dns {}", server),
            RouteDirective::SearchDomain { domain } => write!(f, "search {}", domain),
        }
    }
}

/// Ordered directives plus the entries that had to be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub directives: Vec<RouteDirective>,
    pub skipped: Vec<RouteError>,
}

impl RoutePlan {
    /// All route directives, in emission order
    pub fn routes(&self) -> impl Iterator<Item = (IpAddr, u8)> + '_ {
        self.directives.iter().filter_map(|d| match d {
            RouteDirective::Route {
                destination,
                prefix_len,
            } => Some((*destination, *prefix_len)),
            _ => None,
        })
    }

    /// All DNS servers, in emission order
    pub fn dns_servers(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.directives.iter().filter_map(|d| match d {
            RouteDirective::DnsServer { server } => Some(*server),
            _ => None,
        })
    }

    /// The MTU directive value, if one was emitted
    pub fn mtu(&self) -> Option<u32> {
        self.directives.iter().find_map(|d| match d {
            RouteDirective::Mtu { mtu } => Some(*mtu),
            _ => None,
        })
    }

    fn push(&mut self, directive: RouteDirective) {
        debug!("Route plan: {}", directive);
        self.directives.push(directive);
    }

    fn skip(&mut self, error: RouteError) {
        warn!("{}", error);
        self.skipped.push(error);
    }
}

/// Builds a [`RoutePlan`] from an [`IpConfig`]
#[derive(Debug, Clone, Copy)]
pub struct RouteConfigBuilder {
    mtu_floor: u32,
}

impl Default for RouteConfigBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MTU_FLOOR)
    }
}

impl RouteConfigBuilder {
    /// Create a builder with the given MTU floor
    pub fn new(mtu_floor: u32) -> Self {
        Self { mtu_floor }
    }

    /// Produce the plan in the fixed order: addresses, MTU, default
    /// routes, subnet routes, DNS, search domain
    pub fn build(&self, ip: &IpConfig) -> RoutePlan {
        let mut plan = RoutePlan::default();

        self.add_ipv4_address(&mut plan, ip);
        self.add_ipv6_address(&mut plan, ip);

        plan.push(RouteDirective::Mtu {
            mtu: ip.mtu.unwrap_or(0).max(self.mtu_floor),
        });

        self.add_default_routes(&mut plan, ip);
        self.add_subnet_routes(&mut plan, &ip.split_includes);
        self.add_dns_servers(&mut plan, &ip.dns);

        if let Some(domain) = ip.search_domain.as_deref().map(str::trim) {
            if !domain.is_empty() {
                plan.push(RouteDirective::SearchDomain {
                    domain: domain.to_string(),
                });
            }
        }

        plan
    }

    fn add_ipv4_address(&self, plan: &mut RoutePlan, ip: &IpConfig) {
        let (Some(address), Some(netmask)) = (ip.address.as_deref(), ip.netmask.as_deref()) else {
            return;
        };

        // The interface keeps its host address; only the prefix comes from the mask.
        let parsed = address
            .trim()
            .parse::<Ipv4Addr>()
            .ok()
            .zip(parse_dotted_mask(netmask).ok());
        match parsed {
            Some((host, prefix_len)) => plan.push(RouteDirective::Address {
                address: IpAddr::V4(host),
                prefix_len,
            }),
            None => plan.skip(RouteError::InvalidInterfaceAddress {
                entry: format!("{}/{}", address, netmask),
            }),
        }
    }

    fn add_ipv6_address(&self, plan: &mut RoutePlan, ip: &IpConfig) {
        let Some(address6) = ip.address6.as_deref() else {
            return;
        };

        let parts: Vec<&str> = address6.trim().split('/').collect();
        if parts.len() != 2 {
            return;
        }

        match parse_ipv6_with_prefix(parts[0], Some(parts[1])) {
            Some((address, prefix_len)) => plan.push(RouteDirective::Address {
                address: IpAddr::V6(address),
                prefix_len,
            }),
            None => plan.skip(RouteError::InvalidInterfaceAddress {
                entry: address6.to_string(),
            }),
        }
    }

    /// A family only gets a default route when no split-include of that
    /// family is present and the engine assigned an address of it.
    fn add_default_routes(&self, plan: &mut RoutePlan, ip: &IpConfig) {
        let mut ipv4_default = true;
        let mut ipv6_default = true;

        for subnet in &ip.split_includes {
            if subnet.contains(':') {
                ipv6_default = false;
            } else {
                ipv4_default = false;
            }
        }

        if ipv4_default && ip.address.is_some() {
            plan.push(RouteDirective::Route {
                destination: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                prefix_len: 0,
            });
        }

        if ipv6_default && ip.address6.is_some() {
            plan.push(RouteDirective::Route {
                destination: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                prefix_len: 0,
            });
        }
    }

    fn add_subnet_routes(&self, plan: &mut RoutePlan, subnets: &[String]) {
        for subnet in subnets {
            let subnet = subnet.trim();
            match parse_subnet(subnet) {
                Some((destination, prefix_len)) => plan.push(RouteDirective::Route {
                    destination,
                    prefix_len,
                }),
                None => plan.skip(RouteError::InvalidSubnet {
                    entry: subnet.to_string(),
                }),
            }
        }
    }

    fn add_dns_servers(&self, plan: &mut RoutePlan, servers: &[String]) {
        for server in servers {
            let server = server.trim();
            match server.parse::<IpAddr>() {
                Ok(address) => {
                    plan.push(RouteDirective::DnsServer { server: address });
                    plan.push(RouteDirective::Route {
                        destination: address,
                        prefix_len: if address.is_ipv6() { 128 } else { 32 },
                    });
                }
                Err(_) => plan.skip(RouteError::InvalidDnsServer {
                    entry: server.to_string(),
                }),
            }
        }
    }
}

fn parse_ipv6_with_prefix(address: &str, prefix: Option<&str>) -> Option<(Ipv6Addr, u8)> {
    let address = address.trim().parse::<Ipv6Addr>().ok()?;
    let prefix_len = match prefix {
        None => 128,
        Some(prefix) => prefix.trim().parse::<u8>().ok().filter(|len| *len <= 128)?,
    };
    Some((address, prefix_len))
}

fn parse_subnet(subnet: &str) -> Option<(IpAddr, u8)> {
    if subnet.contains(':') {
        let (address, prefix) = match subnet.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (subnet, None),
        };
        let (address, prefix_len) = parse_ipv6_with_prefix(address, prefix)?;
        return Some((IpAddr::V6(address), prefix_len));
    }

    let cidr = if subnet.contains('/') {
        Cidr::parse_combined(subnet)
    } else {
        Cidr::parse_combined(&format!("{}/32", subnet))
    }
    .ok()?;
    Some((IpAddr::V4(cidr.network()), cidr.prefix_len()))
}
