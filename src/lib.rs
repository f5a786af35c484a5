// Warpline - ships structured log records to a Warp10 ingestion endpoint
// Two transport modes: one-shot HTTP(S) request/response updates, or data
// lines on a persistent streaming WebSocket.

pub mod config;
pub mod connection;
pub mod line;
pub mod shipper;

pub use config::{ConfigError, Protocol, TransportConfig};
pub use connection::{ConnectionState, MockSocket, ReadyGate, SocketWriter, StreamConnection};
pub use line::LogEntry;
pub use shipper::{
    HttpPoster, MockPoster, ShipError, TransportEvent, UpdatePoster, Warp10Transport,
};
