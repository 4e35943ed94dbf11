//! Multipart HTTP transport for the audiobook API
//!
//! - `POST {api_url}/audiobooks` with `audio_file` + `metadata` fields
//! - `GET {api_url}/audiobooks` for the existing-title listing

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use crate::transport::{TransportResponse, UploadRequest, UploadTransport};

/// Transport talking to the real remote store
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct AudiobookListing {
    title: String,
}

impl HttpTransport {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        if config.api_url.trim().is_empty() {
            return Err(DeliveryError::Transport(
                "api_url is not configured".to_string(),
            ));
        }

        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn audiobooks_url(&self) -> String {
        format!("{}/audiobooks", self.base_url)
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse> {
        let audio = multipart::Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| DeliveryError::Transport(format!("Invalid audio part: {}", e)))?;
        let metadata = multipart::Part::text(request.metadata_json)
            .mime_str("application/json")
            .map_err(|e| DeliveryError::Transport(format!("Invalid metadata part: {}", e)))?;

        let form = multipart::Form::new()
            .part("audio_file", audio)
            .part("metadata", metadata);

        let response = self
            .client
            .post(self.audiobooks_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(TransportResponse { status, body })
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.audiobooks_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let listings: Vec<AudiobookListing> = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("Failed to parse listing: {}", e)))?;

        Ok(listings.into_iter().map(|l| l.title).collect())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
