use async_trait::async_trait;

use crate::error::Result;

/// One multipart upload: the audio bytes plus serialized metadata
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub audio: Vec<u8>,
    pub metadata_json: String,
}

/// Raw server answer to an upload attempt
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for remote store transports
///
/// `send` returns `Err` only for transport-level failures (no response was
/// received). Any HTTP response, including 4xx/5xx, comes back as `Ok`.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Perform a single upload attempt
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse>;

    /// Titles already present in the remote store
    async fn list_titles(&self) -> Result<Vec<String>>;

    /// Get the transport name for display
    fn name(&self) -> &'static str;
}
