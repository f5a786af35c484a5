// Readiness gate - bounded poll of the socket state before a send
// The socket library exposes no blocking "wait until open", so the gate
// polls at a fixed interval with a capped attempt count. Exhausting the
// window is not a failure: the caller sends anyway and any socket error
// takes the normal error path.

use super::StreamConnection;
use std::time::Duration;

/// Default poll interval between state checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of polling attempts before giving up the wait.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;

/// Bounded-poll wait for the streaming socket to reach Open
#[derive(Debug, Clone, Copy)]
pub struct ReadyGate {
    interval: Duration,
    attempts: u32,
}

impl ReadyGate {
    /// Create a gate with a custom interval and attempt cap
    pub fn new(interval: Duration, attempts: u32) -> Self {
        Self { interval, attempts }
    }

    /// Poll until the connection reports Open or the attempt cap is hit.
    /// Returns whether Open was reached; the caller proceeds either way.
    pub async fn wait_for_open(&self, connection: &StreamConnection) -> bool {
        for _ in 0..self.attempts {
            if connection.state().is_open() {
                return true;
            }
            tokio::time::sleep(self.interval).await;
        }
        connection.state().is_open()
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_ATTEMPTS)
    }
}
