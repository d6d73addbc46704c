//! Tests for turning engine IP parameters into route directives

use ocvpn_core::error::RouteError;
use ocvpn_core::vpn::{IpConfig, RouteConfigBuilder, RouteDirective};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn base() -> IpConfig {
    IpConfig {
        address: Some("10.8.0.12".to_string()),
        netmask: Some("255.255.255.0".to_string()),
        ..IpConfig::default()
    }
}

fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[test]
fn test_full_tunnel_plan_order() {
    let ip = IpConfig {
        address6: Some("fd00:8::12/64".to_string()),
        mtu: Some(1400),
        dns: vec!["10.8.0.1".to_string()],
        search_domain: Some("corp.example.com".to_string()),
        ..base()
    };

    let plan = RouteConfigBuilder::default().build(&ip);

    assert!(plan.skipped.is_empty());
    assert_eq!(
        plan.directives,
        vec![
            RouteDirective::Address {
                address: v4(10, 8, 0, 12),
                prefix_len: 24
            },
            RouteDirective::Address {
                address: "fd00:8::12".parse().unwrap(),
                prefix_len: 64
            },
            RouteDirective::Mtu { mtu: 1400 },
            RouteDirective::Route {
                destination: v4(0, 0, 0, 0),
                prefix_len: 0
            },
            RouteDirective::Route {
                destination: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                prefix_len: 0
            },
            RouteDirective::DnsServer {
                server: v4(10, 8, 0, 1)
            },
            RouteDirective::Route {
                destination: v4(10, 8, 0, 1),
                prefix_len: 32
            },
            RouteDirective::SearchDomain {
                domain: "corp.example.com".to_string()
            },
        ]
    );
}

#[test]
fn test_ipv4_split_include_suppresses_only_ipv4_default() {
    let ip = IpConfig {
        address6: Some("fd00:8::12/64".to_string()),
        split_includes: vec!["192.168.10.0/24".to_string()],
        ..base()
    };

    let routes: Vec<_> = RouteConfigBuilder::default().build(&ip).routes().collect();

    assert_eq!(
        routes,
        vec![
            (IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
            (v4(192, 168, 10, 0), 24)
        ]
    );
}

#[test]
fn test_no_default_route_without_address_of_family() {
    let plan = RouteConfigBuilder::default().build(&base());
    let routes: Vec<_> = plan.routes().collect();
    assert_eq!(routes, vec![(v4(0, 0, 0, 0), 0)]);

    let empty = RouteConfigBuilder::default().build(&IpConfig::default());
    assert_eq!(empty.routes().count(), 0);
    assert_eq!(empty.mtu(), Some(1280));
}

#[test]
fn test_split_includes_are_normalized() {
    let ip = IpConfig {
        split_includes: vec![
            "10.1.2.3/255.255.0.0".to_string(),
            "172.16.0.9".to_string(),
            "fd00:1::/48".to_string(),
            "fd00:2::7".to_string(),
        ],
        ..base()
    };

    let routes: Vec<_> = RouteConfigBuilder::default().build(&ip).routes().collect();

    assert_eq!(
        routes,
        vec![
            (v4(10, 1, 0, 0), 16),
            (v4(172, 16, 0, 9), 32),
            ("fd00:1::".parse().unwrap(), 48),
            ("fd00:2::7".parse().unwrap(), 128),
        ]
    );
}

#[test]
fn test_one_bad_dns_server_of_three_is_skipped() {
    let ip = IpConfig {
        dns: vec![
            "10.8.0.1".to_string(),
            "ns.example.com".to_string(),
            "fd00::53".to_string(),
        ],
        ..base()
    };

    let plan = RouteConfigBuilder::default().build(&ip);

    let servers: Vec<_> = plan.dns_servers().collect();
    assert_eq!(servers, vec![v4(10, 8, 0, 1), "fd00::53".parse().unwrap()]);
    assert_eq!(
        plan.skipped,
        vec![RouteError::InvalidDnsServer {
            entry: "ns.example.com".to_string()
        }]
    );
    assert!(plan
        .routes()
        .any(|route| route == ("fd00::53".parse().unwrap(), 128)));
}

#[test]
fn test_bad_entries_do_not_abort_the_plan() {
    let ip = IpConfig {
        address: Some("10.8.0.300".to_string()),
        address6: Some("fd00::1/200".to_string()),
        split_includes: vec!["bogus/8".to_string(), "10.9.0.0/16".to_string()],
        ..base()
    };

    let plan = RouteConfigBuilder::default().build(&ip);

    assert_eq!(plan.skipped.len(), 3);
    assert_eq!(
        plan.skipped[2].to_string(),
        "ROUTE: skipping invalid route bogus/8"
    );
    assert!(plan.routes().any(|route| route == (v4(10, 9, 0, 0), 16)));
}

#[test]
fn test_malformed_ipv6_address_without_prefix_is_ignored() {
    let ip = IpConfig {
        address6: Some("fd00::1".to_string()),
        ..base()
    };

    let plan = RouteConfigBuilder::default().build(&ip);

    assert!(plan.skipped.is_empty());
    assert!(!plan.directives.iter().any(|d| matches!(
        d,
        RouteDirective::Address {
            address: IpAddr::V6(_),
            ..
        }
    )));
}

#[test]
fn test_custom_mtu_floor() {
    let ip = IpConfig {
        mtu: Some(1300),
        ..base()
    };
    assert_eq!(RouteConfigBuilder::new(1400).build(&ip).mtu(), Some(1400));
    assert_eq!(RouteConfigBuilder::new(1200).build(&ip).mtu(), Some(1300));
}

#[test]
fn test_directives_serialize_with_kind_tag() {
    let directive = RouteDirective::Route {
        destination: v4(10, 0, 0, 0),
        prefix_len: 8,
    };
    let json = serde_json::to_value(&directive).unwrap();
    assert_eq!(json["kind"], "route");
    assert_eq!(json["destination"], "10.0.0.0");
    assert_eq!(directive.to_string(), "route 10.0.0.0/8");
}
