// Streaming connection manager - owns the WebSocket lifetime
// Opens the socket, runs the control-line handshake, keeps it alive, and
// records how it closed. No automatic reconnect: a closed connection stays
// closed until the caller builds a new transport.

mod ready;

pub use ready::ReadyGate;

use crate::shipper::{ShipError, TransportEvent};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Interval between keep-alive NOOP lines; stays under the typical
/// server-side idle timeout.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(270);

// ============================================================================
// CONNECTION STATE
// ============================================================================

/// State of the streaming socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Connecting
    }
}

impl ConnectionState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        match (self, target) {
            (Self::Connecting, Self::Open) => true,
            (Self::Connecting, Self::Closing) => true, // Close before the socket opened
            (Self::Connecting, Self::Closed) => true, // Connect failed
            (Self::Open, Self::Closing) => true,
            (Self::Open, Self::Closed) => true, // Abrupt disconnect
            (Self::Closing, Self::Closed) => true,
            _ => false,
        }
    }

    /// Check if the socket is usable for sends
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

// ============================================================================
// CLOSE BOOKKEEPING
// ============================================================================

/// How the connection closed
#[derive(Debug, Clone)]
pub struct CloseInfo {
    /// True for a protocol-level close, false for an abrupt drop
    pub clean: bool,
    /// Close code/reason or error text
    pub reason: String,
}

// ============================================================================
// SOCKET WRITER
// ============================================================================

/// Write half of the streaming socket.
/// One implementation wraps the real WebSocket sink; `MockSocket` records
/// lines for tests.
#[async_trait]
pub trait SocketWriter: Send + Sync {
    /// Write one line to the socket
    async fn write_line(&self, line: &str) -> Result<(), ShipError>;

    /// Close the write half; further writes fail with `NotConnected`
    async fn shutdown(&self);
}

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Writer over a tokio-tungstenite sink; empty until the connect task
/// attaches the established socket
struct WsWriter {
    sink: tokio::sync::Mutex<Option<WsSink>>,
}

impl WsWriter {
    fn new() -> Self {
        Self {
            sink: tokio::sync::Mutex::new(None),
        }
    }

    async fn attach(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }
}

#[async_trait]
impl SocketWriter for WsWriter {
    async fn write_line(&self, line: &str) -> Result<(), ShipError> {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink
                .send(Message::Text(line.to_string()))
                .await
                .map_err(|e| ShipError::SocketSend(e.to_string())),
            None => Err(ShipError::NotConnected),
        }
    }

    async fn shutdown(&self) {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
    }
}

// ============================================================================
// MOCK SOCKET
// ============================================================================

/// Mock implementation of SocketWriter for testing
pub struct MockSocket {
    lines: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MockSocket {
    /// Create a new mock socket that accepts every write
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Configure every write to fail with a message
    pub fn with_failure(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Change the failure mode mid-test
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    /// Lines written so far, in write order
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Whether `shutdown` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockSocket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketWriter for MockSocket {
    async fn write_line(&self, line: &str) -> Result<(), ShipError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ShipError::NotConnected);
        }
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(ShipError::SocketSend(message));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// STREAM CONNECTION
// ============================================================================

struct ConnShared {
    write_token: String,
    keep_ws_alive: bool,
    keepalive_interval: Duration,
    writer: Arc<dyn SocketWriter>,
    state: Mutex<ConnectionState>,
    last_close: Mutex<Option<CloseInfo>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ConnShared {
    /// Move to `target` if the transition is valid; returns whether it was
    /// taken.
    fn set_state(&self, target: ConnectionState) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.can_transition_to(&target) {
            *state = target;
            true
        } else {
            false
        }
    }

    /// Transition to Open and run the control-line handshake: the write
    /// token first, then the directive asking the server to report errors
    /// as messages instead of closing. Control lines go out before any
    /// data line can be sent. Bails out when the connection was closed
    /// while the socket was still connecting.
    async fn mark_open(self: &Arc<Self>) {
        if !self.set_state(ConnectionState::Open) {
            debug!("socket opened after the connection was closed, ignoring");
            return;
        }
        info!("connection established");

        let token_line = format!("TOKEN {}", self.write_token);
        if let Err(e) = self.writer.write_line(&token_line).await {
            warn!(error = %e, "control-line handshake failed");
            self.mark_closed(false, &e.to_string());
            return;
        }
        if let Err(e) = self.writer.write_line("ONERROR MESSAGE").await {
            warn!(error = %e, "control-line handshake failed");
            self.mark_closed(false, &e.to_string());
            return;
        }

        let _ = self.event_tx.send(TransportEvent::StreamOpened);

        if self.keep_ws_alive {
            let writer = self.writer.clone();
            let interval = self.keepalive_interval;
            let mut keepalive = self.keepalive.lock().unwrap();
            // The connection may have closed during the handshake awaits;
            // only start the timer while still Open, under the keepalive
            // lock, so mark_closed can always cancel it
            if self.state.lock().unwrap().is_open() {
                *keepalive = Some(tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(interval).await;
                        if let Err(e) = writer.write_line("NOOP").await {
                            warn!(error = %e, "keep-alive NOOP failed, stopping timer");
                            break;
                        }
                    }
                }));
            }
        }
    }

    /// Record how the socket closed and cancel the keep-alive timer.
    /// Idempotent: only the first closure is recorded.
    fn mark_closed(&self, clean: bool, reason: &str) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }
        if let Some(handle) = self.keepalive.lock().unwrap().take() {
            handle.abort();
        }
        if clean {
            info!(reason, "clean exit");
        } else {
            warn!(reason, "socket died");
        }
        *self.last_close.lock().unwrap() = Some(CloseInfo {
            clean,
            reason: reason.to_string(),
        });
        let _ = self.event_tx.send(TransportEvent::StreamClosed {
            clean,
            reason: reason.to_string(),
        });
    }
}

/// One streaming socket, owned for the lifetime of the transport instance
pub struct StreamConnection {
    shared: Arc<ConnShared>,
}

impl StreamConnection {
    /// Open a socket to `url` and run the lifecycle in background tasks.
    /// Must be called within a Tokio runtime.
    pub fn connect(
        url: &str,
        write_token: &str,
        keep_ws_alive: bool,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let ws_writer = Arc::new(WsWriter::new());
        let shared = Arc::new(ConnShared {
            write_token: write_token.to_string(),
            keep_ws_alive,
            keepalive_interval: KEEPALIVE_INTERVAL,
            writer: ws_writer.clone(),
            state: Mutex::new(ConnectionState::Connecting),
            last_close: Mutex::new(None),
            keepalive: Mutex::new(None),
            event_tx,
        });

        let url = url.to_string();
        let task_shared = shared.clone();
        tokio::spawn(async move {
            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    let (sink, stream) = socket.split();
                    ws_writer.attach(sink).await;
                    task_shared.mark_open().await;
                    Self::read_loop(task_shared, stream).await;
                }
                Err(e) => {
                    task_shared.mark_closed(false, &e.to_string());
                }
            }
        });

        Self { shared }
    }

    /// Build a connection over an arbitrary writer, starting in Connecting.
    /// Used with `MockSocket` in tests; drive it with `mark_open` and
    /// `mark_closed`.
    pub fn with_writer(
        writer: Arc<dyn SocketWriter>,
        write_token: &str,
        keep_ws_alive: bool,
        keepalive_interval: Duration,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(ConnShared {
                write_token: write_token.to_string(),
                keep_ws_alive,
                keepalive_interval,
                writer,
                state: Mutex::new(ConnectionState::Connecting),
                last_close: Mutex::new(None),
                keepalive: Mutex::new(None),
                event_tx,
            }),
        }
    }

    async fn read_loop(
        shared: Arc<ConnShared>,
        mut stream: futures_util::stream::SplitStream<
            WebSocketStream<MaybeTlsStream<TcpStream>>,
        >,
    ) {
        while let Some(next) = stream.next().await {
            match next {
                Ok(Message::Text(text)) => {
                    // Diagnostic only; no protocol semantics on responses
                    debug!(message = %text, "message received from server");
                    let _ = shared.event_tx.send(TransportEvent::ServerMessage(text));
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason))
                        .unwrap_or_default();
                    shared.mark_closed(true, &reason);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    shared.mark_closed(false, &e.to_string());
                    return;
                }
            }
        }
        shared.mark_closed(false, "stream ended");
    }

    /// Current socket state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().unwrap()
    }

    /// How the socket closed, if it has
    pub fn last_close(&self) -> Option<CloseInfo> {
        self.shared.last_close.lock().unwrap().clone()
    }

    /// Write one data line to the socket
    pub async fn send_line(&self, line: &str) -> Result<(), ShipError> {
        self.shared.writer.write_line(line).await
    }

    /// Transition to Open and perform the handshake.
    /// The connect task calls this once the real socket is established;
    /// tests call it to simulate the open event on a mock socket.
    pub async fn mark_open(&self) {
        self.shared.mark_open().await;
    }

    /// Record a closure observed on the socket.
    /// Tests call this to simulate server-side closes.
    pub fn mark_closed(&self, clean: bool, reason: &str) {
        self.shared.mark_closed(clean, reason);
    }

    /// Close the socket; idempotent if already closed
    pub async fn close(&self) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.shared.set_state(ConnectionState::Closing);
        self.shared.writer.shutdown().await;
        self.shared.mark_closed(true, "closed by caller");
    }
}
