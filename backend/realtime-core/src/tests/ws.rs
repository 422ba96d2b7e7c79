use crate::config::RealtimeConfig;
use crate::error::TransportError;
use crate::transport::{StompSettings, websocket_endpoint};

use std::time::Duration;

/// **VALUE**: The socket URL is derived from the REST base URL.
///
/// **BUG THIS CATCHES**: Dropping a base path prefix (reverse proxy mounts
/// the API under `/backend`) or doubling the slash between base and path.
#[test]
fn given_http_base_urls_when_endpoint_built_then_ws_scheme_and_joined_path() {
    let cases = [
        ("http://localhost:8080", "/ws", "ws://localhost:8080/ws"),
        ("https://api.example.com/", "/ws", "wss://api.example.com/ws"),
        ("http://host/backend/", "/ws", "ws://host/backend/ws"),
        ("ws://host:9000", "stomp", "ws://host:9000/stomp"),
    ];

    for (base, path, expected) in cases {
        let url = websocket_endpoint(base, path).unwrap();
        assert_eq!(url.as_str(), expected, "base={base} path={path}");
    }
}

#[test]
fn given_unsupported_scheme_when_endpoint_built_then_endpoint_error() {
    let result = websocket_endpoint("ftp://host", "/ws");

    let error = result.unwrap_err();
    assert!(matches!(error, TransportError::Endpoint { .. }));
    assert!(!error.is_retryable());
}

#[test]
fn given_default_config_when_settings_resolved_then_values_carried_over() {
    // GIVEN: Default config
    let config = RealtimeConfig::default();

    // WHEN: Resolving transport settings
    let settings = StompSettings::from_config(&config).unwrap();

    // THEN: Endpoint, topics and timings match
    assert_eq!(settings.endpoint.as_str(), "ws://localhost:8080/ws");
    assert_eq!(settings.topics, config.realtime.topics);
    assert_eq!(settings.reconnect_delay, Duration::from_millis(3000));
    assert_eq!(settings.max_reconnect_attempts, 5);
    assert_eq!(settings.heartbeat_incoming, Duration::from_millis(4000));
    assert_eq!(settings.heartbeat_outgoing, Duration::from_millis(4000));
}
