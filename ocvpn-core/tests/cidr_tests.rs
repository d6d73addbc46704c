//! Tests for CIDR parsing and mask normalization

use ocvpn_core::vpn::cidr::{mask_to_prefix_len, parse_dotted_mask, prefix_len_to_mask, Cidr};
use std::net::Ipv4Addr;

#[test]
fn test_every_contiguous_mask_round_trips() {
    for prefix_len in 0..=32u8 {
        let mask = prefix_len_to_mask(prefix_len);
        assert_eq!(mask_to_prefix_len(mask), prefix_len, "mask {}", mask);
    }
}

#[test]
fn test_non_contiguous_masks_fall_back_to_host() {
    for mask in ["255.0.255.0", "0.255.255.255", "255.255.255.1", "128.0.0.1"] {
        assert_eq!(parse_dotted_mask(mask).unwrap(), 32, "mask {}", mask);
    }
}

#[test]
fn test_zero_mask_is_default_route() {
    assert_eq!(mask_to_prefix_len(Ipv4Addr::UNSPECIFIED), 0);
    let cidr = Cidr::with_mask("192.168.7.9", "0.0.0.0").unwrap();
    assert_eq!(cidr.to_string(), "0.0.0.0/0");
    assert!(cidr.contains(Ipv4Addr::new(8, 8, 8, 8)));
}

#[test]
fn test_host_bits_are_cleared() {
    // Given: a split include carrying host bits
    let cidr: Cidr = "10.20.30.40/255.255.0.0".parse().unwrap();

    // Then: only the network remains
    assert_eq!(cidr.network(), Ipv4Addr::new(10, 20, 0, 0));
    assert_eq!(cidr.prefix_len(), 16);
    assert_eq!(cidr.netmask(), Ipv4Addr::new(255, 255, 0, 0));
    assert!(cidr.contains(Ipv4Addr::new(10, 20, 255, 1)));
    assert!(!cidr.contains(Ipv4Addr::new(10, 21, 0, 1)));
}

#[test]
fn test_numeric_prefix_forms() {
    assert_eq!("172.16.5.4/12".parse::<Cidr>().unwrap().to_string(), "172.16.0.0/12");
    assert_eq!("172.16.5.4/40".parse::<Cidr>().unwrap().prefix_len(), 32);
    assert_eq!(
        "172.16.5.4/99999999999".parse::<Cidr>().unwrap().prefix_len(),
        32
    );
    assert_eq!(Cidr::new(Ipv4Addr::new(1, 2, 3, 4), 200).prefix_len(), 32);
}

#[test]
fn test_malformed_input_is_rejected() {
    assert!("10.0.0.1".parse::<Cidr>().is_err());
    assert!("10.0.0/8".parse::<Cidr>().is_err());
    assert!("10.0.0.1/255.0.x.0".parse::<Cidr>().is_err());
    assert!(Cidr::with_mask("example.com", "255.0.0.0").is_err());
    assert!(parse_dotted_mask("").is_err());
}
