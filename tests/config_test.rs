// Transport Config Tests
// Construction-time validation, protocol parsing, and URL computation

use warpline::config::{
    ConfigError, Protocol, TransportConfig, SANDBOX_HOST, STREAM_ENDPOINT, UPDATE_ENDPOINT,
};
use warpline::shipper::Warp10Transport;

fn valid_config(protocol: Protocol) -> TransportConfig {
    TransportConfig::new(protocol, "example.org", "T", "ClassTest")
}

// ============================================================================
// PROTOCOL
// ============================================================================

#[test]
fn test_protocol_parse() {
    assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
    assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::Https);
    assert_eq!("ws".parse::<Protocol>().unwrap(), Protocol::Ws);
    assert_eq!("wss".parse::<Protocol>().unwrap(), Protocol::Wss);
}

#[test]
fn test_protocol_parse_invalid() {
    let err = "tcp".parse::<Protocol>().unwrap_err();
    assert_eq!(err, ConfigError::InvalidProtocol("tcp".to_string()));

    assert!("HTTP".parse::<Protocol>().is_err());
    assert!("".parse::<Protocol>().is_err());
}

#[test]
fn test_protocol_mode_and_security() {
    assert!(!Protocol::Http.is_streaming());
    assert!(!Protocol::Https.is_streaming());
    assert!(Protocol::Ws.is_streaming());
    assert!(Protocol::Wss.is_streaming());

    assert!(!Protocol::Http.is_secure());
    assert!(Protocol::Https.is_secure());
    assert!(!Protocol::Ws.is_secure());
    assert!(Protocol::Wss.is_secure());
}

#[test]
fn test_protocol_display() {
    assert_eq!(Protocol::Wss.to_string(), "wss");
    assert_eq!(Protocol::Http.to_string(), "http");
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_valid_config_passes() {
    for protocol in [Protocol::Http, Protocol::Https, Protocol::Ws, Protocol::Wss] {
        assert!(valid_config(protocol).validate().is_ok());
    }
}

#[test]
fn test_missing_write_token() {
    let config = TransportConfig::new(Protocol::Https, "example.org", "", "ClassTest");
    assert_eq!(config.validate(), Err(ConfigError::MissingWriteToken));
}

#[test]
fn test_missing_class_name() {
    let config = TransportConfig::new(Protocol::Https, "example.org", "T", "");
    assert_eq!(config.validate(), Err(ConfigError::MissingClassName));
}

#[test]
fn test_missing_host() {
    let config = TransportConfig::new(Protocol::Https, "", "T", "ClassTest");
    assert_eq!(config.validate(), Err(ConfigError::MissingHost));
}

#[test]
fn test_sandbox_requires_secure_protocol() {
    for protocol in [Protocol::Http, Protocol::Ws] {
        let config = TransportConfig::new(protocol, SANDBOX_HOST, "T", "ClassTest");
        assert_eq!(config.validate(), Err(ConfigError::InsecureSandboxProtocol));
    }
    for protocol in [Protocol::Https, Protocol::Wss] {
        let config = TransportConfig::new(protocol, SANDBOX_HOST, "T", "ClassTest");
        assert!(config.validate().is_ok());
    }
}

#[tokio::test]
async fn test_transport_construction_rejects_invalid_config() {
    let config = TransportConfig::new(Protocol::Https, "example.org", "", "ClassTest");
    match Warp10Transport::new(config) {
        Err(ConfigError::MissingWriteToken) => {}
        other => panic!("expected MissingWriteToken, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// URL COMPUTATION
// ============================================================================

#[test]
fn test_update_url_without_port() {
    let config = valid_config(Protocol::Https);
    assert_eq!(config.endpoint(), UPDATE_ENDPOINT);
    assert_eq!(config.url(), "https://example.org/api/v0/update");
}

#[test]
fn test_update_url_with_port() {
    let config = valid_config(Protocol::Http).with_port(8080);
    assert_eq!(config.url(), "http://example.org:8080/api/v0/update");
}

#[test]
fn test_stream_url() {
    let config = valid_config(Protocol::Wss);
    assert_eq!(config.endpoint(), STREAM_ENDPOINT);
    assert_eq!(config.url(), "wss://example.org/api/v0/streamupdate");

    let config = valid_config(Protocol::Ws).with_port(8080);
    assert_eq!(config.url(), "ws://example.org:8080/api/v0/streamupdate");
}

#[test]
fn test_streaming_mode_selection() {
    assert!(!valid_config(Protocol::Https).is_streaming());
    assert!(valid_config(Protocol::Wss).is_streaming());
}

// ============================================================================
// BUILDER AND DEFAULTS
// ============================================================================

#[test]
fn test_defaults() {
    let config = valid_config(Protocol::Https);

    assert_eq!(config.port, None);
    assert!(config.labels.is_empty());
    assert_eq!(config.timestamp, None);
    assert_eq!(config.latitude, None);
    assert_eq!(config.longitude, None);
    assert_eq!(config.elevation, None);
    assert!(config.keep_ws_alive);
    assert_eq!(config.level, "info");
    assert!(!config.silent);
    assert_eq!(config.name, "Warp10");
}

#[test]
fn test_builder_fields() {
    let config = valid_config(Protocol::Wss)
        .with_port(443)
        .with_label("env", "prod")
        .with_label("region", "eu")
        .with_timestamp("1700000000000000")
        .with_position("48.85", "2.35")
        .with_elevation("120")
        .with_keep_ws_alive(false)
        .with_level("warn")
        .with_silent(true)
        .with_name("audit");

    assert_eq!(config.port, Some(443));
    assert_eq!(config.labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(config.labels.len(), 2);
    assert_eq!(config.timestamp.as_deref(), Some("1700000000000000"));
    assert_eq!(config.latitude.as_deref(), Some("48.85"));
    assert_eq!(config.longitude.as_deref(), Some("2.35"));
    assert_eq!(config.elevation.as_deref(), Some("120"));
    assert!(!config.keep_ws_alive);
    assert_eq!(config.level, "warn");
    assert!(config.silent);
    assert_eq!(config.name, "audit");
}
