// Update poster - one authenticated POST per record
// Seam between the delivery engine and the HTTP stack; MockPoster records
// requests for tests.

use super::ShipError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Header carrying the write token on update requests.
pub const TOKEN_HEADER: &str = "X-Warp10-Token";

// ============================================================================
// UPDATE POSTER TRAIT
// ============================================================================

/// Trait for posting one encoded line to the update endpoint
#[async_trait]
pub trait UpdatePoster: Send + Sync {
    /// Post `line` to `url`, authenticated with `write_token`
    async fn post_update(&self, url: &str, write_token: &str, line: &str)
        -> Result<(), ShipError>;
}

// ============================================================================
// HTTP POSTER
// ============================================================================

/// Reqwest-backed poster used in request/response mode
pub struct HttpPoster {
    client: reqwest::Client,
}

impl HttpPoster {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdatePoster for HttpPoster {
    async fn post_update(
        &self,
        url: &str,
        write_token: &str,
        line: &str,
    ) -> Result<(), ShipError> {
        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, write_token)
            .body(line.to_string())
            .send()
            .await
            .map_err(|e| ShipError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShipError::Status(status.as_u16()));
        }
        debug!(status = status.as_u16(), "post response");
        Ok(())
    }
}

// ============================================================================
// MOCK POSTER
// ============================================================================

/// One request seen by the mock poster
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub write_token: String,
    pub line: String,
}

/// Mock implementation of UpdatePoster for testing
pub struct MockPoster {
    should_succeed: bool,
    failure: Option<ShipError>,
    delay_ms: u64,
    posts: Mutex<Vec<RecordedPost>>,
}

impl MockPoster {
    /// Create a new mock poster (defaults to failure)
    pub fn new() -> Self {
        Self {
            should_succeed: false,
            failure: None,
            delay_ms: 0,
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Configure to always succeed
    pub fn with_success(mut self) -> Self {
        self.should_succeed = true;
        self
    }

    /// Configure to always fail with an error
    pub fn with_failure(mut self, error: ShipError) -> Self {
        self.should_succeed = false;
        self.failure = Some(error);
        self
    }

    /// Add a delay before responding
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Requests seen so far, in arrival order
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    /// Number of requests seen so far
    pub fn call_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

impl Default for MockPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdatePoster for MockPoster {
    async fn post_update(
        &self,
        url: &str,
        write_token: &str,
        line: &str,
    ) -> Result<(), ShipError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            write_token: write_token.to_string(),
            line: line.to_string(),
        });

        if self.should_succeed {
            Ok(())
        } else {
            Err(self
                .failure
                .clone()
                .unwrap_or_else(|| ShipError::Request("mock failure".to_string())))
        }
    }
}
