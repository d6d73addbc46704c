//! Unit tests for error types and conversions

use ocvpn_core::error::{
    ConfigError, CredentialError, OcvpnError, RouteError, SessionError, VpnError,
};

#[test]
fn test_session_error_messages() {
    assert_eq!(
        SessionError::AuthenticationFailed { code: -3 }.to_string(),
        "Unknown error while obtaining cookie from VPN (code -3)"
    );
    assert_eq!(
        SessionError::AuthenticationAborted.to_string(),
        "User aborted authentication"
    );
    assert_eq!(
        SessionError::ChannelEstablishment { code: -1 }.to_string(),
        "Error when establishing CSTP connection (code -1)"
    );
}

#[test]
fn test_route_error_messages() {
    assert_eq!(
        RouteError::InvalidSubnet {
            entry: "10.0.0/8".to_string()
        }
        .to_string(),
        "ROUTE: skipping invalid route 10.0.0/8"
    );
    assert_eq!(
        RouteError::InvalidDnsServer {
            entry: "ns1".to_string()
        }
        .to_string(),
        "DNS: skipping invalid server ns1"
    );
}

#[test]
fn test_state_error_is_transparent_inside_session_error() {
    let state = VpnError::InvalidStateTransition {
        from: "connected".to_string(),
        to: "connecting".to_string(),
    };
    let session: SessionError = state.clone().into();
    assert_eq!(session.to_string(), state.to_string());
}

#[test]
fn test_conversions_into_top_level_error() {
    let err: OcvpnError = ConfigError::InvalidGateway {
        target: " ".to_string(),
    }
    .into();
    assert!(matches!(err, OcvpnError::Config(_)));
    assert!(err.to_string().starts_with("Configuration error:"));

    let err: OcvpnError = CredentialError::RequestPending.into();
    assert_eq!(
        err.to_string(),
        "Credential error: A credential request is already pending"
    );

    let err: OcvpnError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert!(matches!(err, OcvpnError::Io(_)));
}
