// Delivery engine - accepts a log entry, ships it, reports the outcome
// Transport mode is selected by the configured protocol: one-shot HTTP(S)
// POST per record, or data lines on the persistent streaming socket.
// Outcomes always arrive through the callback and the event channel, never
// through the immediate return of deliver().

mod http;

pub use http::{HttpPoster, MockPoster, RecordedPost, UpdatePoster, TOKEN_HEADER};

use crate::config::{ConfigError, TransportConfig};
use crate::connection::{ReadyGate, SocketWriter, StreamConnection};
use crate::line::{encode_line, LogEntry};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ============================================================================
// SHIP ERRORS
// ============================================================================

/// Errors raised while shipping one record.
/// Clone so the same failure can reach both the callback and the event
/// channel. Never fatal; no retry; a send error does not close the
/// streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShipError {
    #[error("update request failed: {0}")]
    Request(String),

    #[error("update rejected with status {0}")]
    Status(u16),

    #[error("socket send failed: {0}")]
    SocketSend(String),

    #[error("socket not connected")]
    NotConnected,
}

// ============================================================================
// TRANSPORT EVENTS
// ============================================================================

/// Events observable through `poll_events`
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A record was accepted by the endpoint
    Logged,

    /// A delivery failed
    Error(ShipError),

    /// The streaming socket reached Open and completed its handshake
    StreamOpened,

    /// The streaming socket closed, cleanly or abruptly
    StreamClosed { clean: bool, reason: String },

    /// Diagnostic message received from the server
    ServerMessage(String),
}

// ============================================================================
// WARP10 TRANSPORT
// ============================================================================

/// Log transport shipping records to a Warp10 ingestion endpoint
pub struct Warp10Transport {
    config: Arc<TransportConfig>,
    poster: Arc<dyn UpdatePoster>,
    connection: Option<Arc<StreamConnection>>,
    gate: ReadyGate,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Warp10Transport {
    /// Validate the config and build the transport.
    /// In streaming mode the socket is opened here, in the background;
    /// must be called within a Tokio runtime.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = if config.is_streaming() {
            Some(Arc::new(StreamConnection::connect(
                &config.url(),
                &config.write_token,
                config.keep_ws_alive,
                event_tx.clone(),
            )))
        } else {
            None
        };
        Ok(Self {
            config: Arc::new(config),
            poster: Arc::new(HttpPoster::new()),
            connection,
            gate: ReadyGate::default(),
            event_tx,
            event_rx,
        })
    }

    /// Build a streaming transport over a supplied socket writer.
    /// The connection starts in Connecting; drive it with
    /// `connection().mark_open()`. Used with `MockSocket` in tests.
    pub fn with_socket(
        config: TransportConfig,
        writer: Arc<dyn SocketWriter>,
        keepalive_interval: Duration,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = StreamConnection::with_writer(
            writer,
            &config.write_token,
            config.keep_ws_alive,
            keepalive_interval,
            event_tx.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            poster: Arc::new(HttpPoster::new()),
            connection: Some(Arc::new(connection)),
            gate: ReadyGate::default(),
            event_tx,
            event_rx,
        })
    }

    /// Replace the HTTP poster (request/response mode seam)
    pub fn with_poster(mut self, poster: Arc<dyn UpdatePoster>) -> Self {
        self.poster = poster;
        self
    }

    /// Replace the readiness gate (streaming mode timing)
    pub fn with_ready_gate(mut self, gate: ReadyGate) -> Self {
        self.gate = gate;
        self
    }

    /// The transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Name of this transport instance
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The streaming connection, when the protocol selects streaming mode
    pub fn connection(&self) -> Option<Arc<StreamConnection>> {
        self.connection.clone()
    }

    /// Ship one record. Returns immediately; the body runs on a spawned
    /// task and the outcome arrives through `callback` plus a `Logged` or
    /// `Error` event. A panic inside the callback is caught and reduced to
    /// a diagnostic.
    pub fn deliver<F>(&self, entry: LogEntry, callback: F)
    where
        F: FnOnce(Result<(), ShipError>) + Send + 'static,
    {
        let config = self.config.clone();
        let poster = self.poster.clone();
        let connection = self.connection.clone();
        let gate = self.gate;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut callback = Some(callback);

            if config.silent {
                // Audit-log suppression: the caller gets success up front
                // and the record is still attempted; events carry the real
                // outcome.
                invoke_callback(callback.take(), Ok(()));
            }

            let line = encode_line(&config, &entry);

            let outcome = match &connection {
                Some(connection) => {
                    if !gate.wait_for_open(connection).await {
                        debug!("socket not open within readiness window, sending anyway");
                    }
                    connection.send_line(&line).await
                }
                None => {
                    poster
                        .post_update(&config.url(), &config.write_token, &line)
                        .await
                }
            };

            match outcome {
                Ok(()) => {
                    let _ = event_tx.send(TransportEvent::Logged);
                    invoke_callback(callback.take(), Ok(()));
                }
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Error(e.clone()));
                    invoke_callback(callback.take(), Err(e));
                }
            }
        });
    }

    /// Drain pending events (non-blocking)
    pub fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the streaming socket; no-op in request/response mode.
    /// Deliveries already in flight are not retracted.
    pub async fn close(&self) {
        if let Some(connection) = &self.connection {
            connection.close().await;
        }
    }
}

fn invoke_callback<F>(callback: Option<F>, outcome: Result<(), ShipError>)
where
    F: FnOnce(Result<(), ShipError>) + Send + 'static,
{
    let Some(callback) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(move || callback(outcome))).is_err() {
        warn!("delivery callback panicked while reporting the outcome");
    }
}
