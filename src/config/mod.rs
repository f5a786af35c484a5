// Transport configuration - WHERE and HOW records are shipped
// Validated at construction; immutable for the lifetime of the transport

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Public Warp10 sandbox host; only accepts encrypted protocols.
pub const SANDBOX_HOST: &str = "sandbox.senx.io";

/// Endpoint path for one-shot request/response updates.
pub const UPDATE_ENDPOINT: &str = "/api/v0/update";

/// Endpoint path for the persistent streaming socket.
pub const STREAM_ENDPOINT: &str = "/api/v0/streamupdate";

// ============================================================================
// PROTOCOL
// ============================================================================

/// Wire protocol used to reach the ingestion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl Protocol {
    /// Check whether this protocol uses the persistent streaming socket
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Ws | Self::Wss)
    }

    /// Check whether this protocol encrypts the wire
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Https | Self::Wss)
    }

    /// URL scheme string
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "ws" => Ok(Self::Ws),
            "wss" => Ok(Self::Wss),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

/// Errors raised while validating a transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing Warp10 write token")]
    MissingWriteToken,

    #[error("missing class name of the GTS")]
    MissingClassName,

    #[error("invalid protocol '{0}', supported protocols are http(s) and ws(s)")]
    InvalidProtocol(String),

    #[error("missing host")]
    MissingHost,

    #[error("the Warp10 sandbox only supports the https and wss protocols")]
    InsecureSandboxProtocol,
}

// ============================================================================
// TRANSPORT CONFIG
// ============================================================================

/// Configuration for a Warp10 log transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Wire protocol, selects request/response or streaming mode
    pub protocol: Protocol,
    /// Ingestion endpoint host
    pub host: String,
    /// Optional port; omitted from the URL when `None`
    pub port: Option<u16>,
    /// Warp10 write token, mandatory
    pub write_token: String,
    /// Class name of the GTS records are written into, mandatory
    pub class_name: String,
    /// Labels of the GTS; ordered so encoding stays deterministic
    pub labels: BTreeMap<String, String>,
    /// Fixed timestamp; when `None` the server assigns one on ingest
    pub timestamp: Option<String>,
    /// Latitude of the record position
    pub latitude: Option<String>,
    /// Longitude of the record position
    pub longitude: Option<String>,
    /// Elevation of the record position
    pub elevation: Option<String>,
    /// Send periodic NOOP lines to keep the streaming socket alive
    pub keep_ws_alive: bool,
    /// Minimum level label; filtering happens upstream in the host framework
    pub level: String,
    /// Suppress the delivery outcome for the caller (audit-log suppression)
    pub silent: bool,
    /// Name of the transport instance
    pub name: String,
}

impl TransportConfig {
    /// Create a config with the mandatory fields; everything else defaults
    pub fn new(protocol: Protocol, host: &str, write_token: &str, class_name: &str) -> Self {
        Self {
            protocol,
            host: host.to_string(),
            port: None,
            write_token: write_token.to_string(),
            class_name: class_name.to_string(),
            labels: BTreeMap::new(),
            timestamp: None,
            latitude: None,
            longitude: None,
            elevation: None,
            keep_ws_alive: true,
            level: "info".to_string(),
            silent: false,
            name: "Warp10".to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    pub fn with_position(mut self, latitude: &str, longitude: &str) -> Self {
        self.latitude = Some(latitude.to_string());
        self.longitude = Some(longitude.to_string());
        self
    }

    pub fn with_elevation(mut self, elevation: &str) -> Self {
        self.elevation = Some(elevation.to_string());
        self
    }

    pub fn with_keep_ws_alive(mut self, keep_alive: bool) -> Self {
        self.keep_ws_alive = keep_alive;
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_token.is_empty() {
            return Err(ConfigError::MissingWriteToken);
        }
        if self.class_name.is_empty() {
            return Err(ConfigError::MissingClassName);
        }
        if self.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.host == SANDBOX_HOST && !self.protocol.is_secure() {
            return Err(ConfigError::InsecureSandboxProtocol);
        }
        Ok(())
    }

    /// Endpoint path for the selected transport mode
    pub fn endpoint(&self) -> &'static str {
        if self.protocol.is_streaming() {
            STREAM_ENDPOINT
        } else {
            UPDATE_ENDPOINT
        }
    }

    /// Full URL of the ingestion endpoint for the selected mode
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!(
                "{}://{}:{}{}",
                self.protocol.scheme(),
                self.host,
                port,
                self.endpoint()
            ),
            None => format!("{}://{}{}", self.protocol.scheme(), self.host, self.endpoint()),
        }
    }

    /// Check whether this config selects the streaming transport mode
    pub fn is_streaming(&self) -> bool {
        self.protocol.is_streaming()
    }
}
