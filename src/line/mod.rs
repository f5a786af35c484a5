// Line encoder - turns a log entry into one Warp10 line-protocol line
// Pure and synchronous; shape: <ts>/<lat:lon>/<elev> <class>{<labels>} '<msg>'

use crate::config::TransportConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// LOG ENTRY
// ============================================================================

/// One caller-supplied log record; not retained after the send completes
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Level label; carried for the host framework, never reaches the wire
    pub level: Option<String>,
    /// Message: string, structured value, or absent
    pub message: Value,
    /// Extra fields; carried but not encoded, only the message is shipped
    pub fields: BTreeMap<String, Value>,
}

impl LogEntry {
    /// Create an entry with a plain string message
    pub fn new(message: &str) -> Self {
        Self {
            level: None,
            message: Value::String(message.to_string()),
            fields: BTreeMap::new(),
        }
    }

    /// Create an entry carrying a structured message value
    pub fn structured(message: Value) -> Self {
        Self {
            level: None,
            message,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Some(level.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

// ============================================================================
// MESSAGE ESCAPING
// ============================================================================

/// Everything outside the JS `escape()` unreserved set gets percent-encoded.
/// Unreserved: alphanumerics plus `@ * _ + - . /`.
const MESSAGE_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'*')
    .remove(b'_')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/');

/// Percent-escape a message for safe inclusion inside single quotes
pub fn escape_message(message: &str) -> String {
    utf8_percent_encode(message, MESSAGE_ESCAPE_SET).to_string()
}

// ============================================================================
// SEGMENT DERIVATION
// ============================================================================

/// Combine latitude and longitude into the `lat:lon` token.
/// Empty unless both are present.
pub fn coords_token(latitude: Option<&str>, longitude: Option<&str>) -> String {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => format!("{}:{}", lat, lon),
        _ => String::new(),
    }
}

/// Extract the displayable message text from an entry.
/// Strings pass through verbatim, scalars convert to their display form,
/// structured values render as JSON text, absent messages yield "".
pub fn message_text(entry: &LogEntry) -> String {
    match &entry.message {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        value => value.to_string(),
    }
}

fn labels_token(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// LINE ENCODING
// ============================================================================

/// Encode one entry into a line-protocol line.
/// Optional segments render as empty strings between the delimiters; an
/// empty timestamp tells the server to assign one on ingest.
pub fn encode_line(config: &TransportConfig, entry: &LogEntry) -> String {
    let timestamp = config.timestamp.as_deref().unwrap_or("");
    let coords = coords_token(config.latitude.as_deref(), config.longitude.as_deref());
    let elevation = config.elevation.as_deref().unwrap_or("");
    let message = escape_message(&message_text(entry));

    format!(
        "{}/{}/{} {}{{{}}} '{}'",
        timestamp,
        coords,
        elevation,
        config.class_name,
        labels_token(&config.labels),
        message
    )
}
