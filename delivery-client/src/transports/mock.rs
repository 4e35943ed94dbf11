//! Mock transport for testing
//!
//! Replays a scripted sequence of responses and records every request, so
//! retry and fail-fast behavior can be exercised without a server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{DeliveryError, Result};
use crate::transport::{TransportResponse, UploadRequest, UploadTransport};

/// A scripted outcome for one `send` call
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16, String),
    TransportError(String),
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    requests: Vec<UploadRequest>,
    titles: Vec<String>,
}

/// Scripted transport; clones share state.
///
/// Once the script is exhausted every further call answers `200`.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// A transport that always answers 200
    pub fn always_succeeds() -> Self {
        Self::default()
    }

    /// A transport that replays `replies` in order
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let transport = Self::default();
        if let Ok(mut state) = transport.state.lock() {
            state.replies = replies.into_iter().collect();
        }
        transport
    }

    /// Fail `n` times with the given status, then succeed
    pub fn fails_then_succeeds(n: usize, status: u16) -> Self {
        Self::scripted((0..n).map(|_| MockReply::Status(status, "server error".to_string())))
    }

    /// Set titles returned by `list_titles`
    pub fn with_titles(self, titles: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.titles = titles.iter().map(|t| t.to_string()).collect();
        }
        self
    }

    /// Get the number of times `send` was called
    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DeliveryError::Transport("mock state poisoned".to_string()))?;
        state.requests.push(request);

        match state.replies.pop_front() {
            Some(MockReply::Status(status, body)) => Ok(TransportResponse { status, body }),
            Some(MockReply::TransportError(message)) => Err(DeliveryError::Transport(message)),
            None => Ok(TransportResponse {
                status: 200,
                body: r#"{"status":"ok"}"#.to_string(),
            }),
        }
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().map(|s| s.titles.clone()).unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
