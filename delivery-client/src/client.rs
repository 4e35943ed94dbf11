//! Upload with bounded retry and exponential backoff.
//!
//! Each file moves through
//! `Attempting -> Success | RetriableFailure -> (sleep) Attempting | FatalFailure`.
//! 5xx answers and transport errors are retried up to the policy's attempt
//! ceiling; any other non-2xx answer or a missing local file ends the upload
//! at once.

use log::{error, info, warn};
use std::path::Path;

use crate::config::RetryPolicy;
use crate::error::{DeliveryError, Result};
use crate::metadata::Metadata;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::transport::{UploadRequest, UploadTransport};

/// Longest slice of a server response body kept in logs and errors.
const MAX_LOGGED_BODY_CHARS: usize = 500;

/// Summary of a finished upload
#[derive(Debug)]
pub struct UploadReport {
    /// Number of requests actually sent
    pub attempts: u32,
    pub result: Result<()>,
}

impl UploadReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

enum UploadState {
    Attempting { attempt: u32 },
    RetriableFailure { attempt: u32, error: DeliveryError },
    Success { attempts: u32 },
    FatalFailure { attempts: u32, error: DeliveryError },
}

/// Client delivering audio files to the remote store
pub struct DeliveryClient {
    transport: Box<dyn UploadTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl DeliveryClient {
    pub fn new(transport: Box<dyn UploadTransport>) -> Self {
        Self::with_sleeper(transport, Box::new(TokioSleeper))
    }

    pub fn with_sleeper(transport: Box<dyn UploadTransport>, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    /// Upload one file, returning whether it reached the store.
    pub async fn upload(&self, filepath: &Path, metadata: &Metadata) -> bool {
        self.upload_with_report(filepath, metadata).await.succeeded()
    }

    /// Upload one file and report how it went.
    pub async fn upload_with_report(&self, filepath: &Path, metadata: &Metadata) -> UploadReport {
        info!(
            "Uploading '{}' as \"{}\" via {}",
            filepath.display(),
            metadata.title,
            self.transport.name()
        );

        if !filepath.is_file() {
            let error = DeliveryError::MissingFile {
                path: filepath.to_path_buf(),
            };
            error!("{}", error);
            return UploadReport {
                attempts: 0,
                result: Err(error),
            };
        }

        let metadata_json = match metadata.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize metadata: {}", e);
                return UploadReport {
                    attempts: 0,
                    result: Err(e.into()),
                };
            }
        };

        let mut state = UploadState::Attempting { attempt: 0 };
        loop {
            state = match state {
                UploadState::Attempting { attempt } => {
                    info!(
                        "Attempt {} of {}: uploading '{}'",
                        attempt + 1,
                        self.policy.max_attempts,
                        filepath.display()
                    );
                    match self.attempt(filepath, &metadata_json).await {
                        Ok(()) => UploadState::Success {
                            attempts: attempt + 1,
                        },
                        Err(error) if error.is_retriable() => {
                            UploadState::RetriableFailure { attempt, error }
                        }
                        Err(error) => UploadState::FatalFailure {
                            attempts: attempt + 1,
                            error,
                        },
                    }
                }
                UploadState::RetriableFailure { attempt, error } => {
                    warn!("Retriable failure on attempt {}: {}", attempt + 1, error);
                    let next = attempt + 1;
                    if next >= self.policy.max_attempts {
                        UploadState::FatalFailure {
                            attempts: next,
                            error: DeliveryError::Exhausted {
                                attempts: next,
                                last_error: error.to_string(),
                            },
                        }
                    } else {
                        let delay = self.policy.delay_after(attempt);
                        info!("Waiting {} seconds before retrying", delay.as_secs());
                        self.sleeper.sleep(delay).await;
                        UploadState::Attempting { attempt: next }
                    }
                }
                UploadState::Success { attempts } => {
                    info!("Upload of '{}' succeeded", filepath.display());
                    return UploadReport {
                        attempts,
                        result: Ok(()),
                    };
                }
                UploadState::FatalFailure { attempts, error } => {
                    error!("Upload of '{}' failed: {}", filepath.display(), error);
                    return UploadReport {
                        attempts,
                        result: Err(error),
                    };
                }
            };
        }
    }

    /// One request with a freshly read copy of the file.
    async fn attempt(&self, filepath: &Path, metadata_json: &str) -> Result<()> {
        let audio = tokio::fs::read(filepath).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeliveryError::MissingFile {
                    path: filepath.to_path_buf(),
                }
            } else {
                DeliveryError::Io(e)
            }
        })?;

        let file_name = filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let response = self
            .transport
            .send(UploadRequest {
                file_name,
                audio,
                metadata_json: metadata_json.to_string(),
            })
            .await?;

        if response.is_success() {
            info!("Server response: {}", truncate(&response.body));
            return Ok(());
        }

        Err(DeliveryError::Http {
            status: response.status,
            body: truncate(&response.body),
        })
    }

    /// Titles already stored remotely.
    pub async fn existing_titles(&self) -> Result<Vec<String>> {
        self.transport.list_titles().await
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_LOGGED_BODY_CHARS {
        return body.to_string();
    }
    let mut short: String = body.chars().take(MAX_LOGGED_BODY_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::RecordingSleeper;
    use crate::transports::{MockReply, MockTransport};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf, Metadata) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("digest.mp3");
        std::fs::write(&path, b"ID3 fake mp3 bytes").unwrap();
        let metadata = Metadata::new("Daily Digest for 2024-05-01", 60, r#"{"Intro":0}"#.into());
        (temp_dir, path, metadata)
    }

    fn client(transport: &MockTransport, sleeper: &RecordingSleeper) -> DeliveryClient {
        DeliveryClient::with_sleeper(Box::new(transport.clone()), Box::new(sleeper.clone()))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::always_succeeds();
        let sleeper = RecordingSleeper::new();

        let report = client(&transport, &sleeper)
            .upload_with_report(&path, &metadata)
            .await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert!(sleeper.delays().is_empty());

        let request = &transport.requests()[0];
        assert_eq!(request.file_name, "digest.mp3");
        assert_eq!(request.audio, b"ID3 fake mp3 bytes");
        assert!(request.metadata_json.contains("Daily Digest for 2024-05-01"));
    }

    #[tokio::test]
    async fn test_server_errors_then_success() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::fails_then_succeeds(3, 503);
        let sleeper = RecordingSleeper::new();

        let report = client(&transport, &sleeper)
            .upload_with_report(&path, &metadata)
            .await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 4);
        assert_eq!(transport.call_count(), 4);
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40)
            ]
        );
    }

    #[tokio::test]
    async fn test_forbidden_is_fatal_without_sleep() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::scripted([MockReply::Status(403, "Forbidden".into())]);
        let sleeper = RecordingSleeper::new();

        let uploaded = client(&transport, &sleeper).upload(&path, &metadata).await;

        assert!(!uploaded);
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::scripted([
            MockReply::TransportError("connection refused".into()),
            MockReply::TransportError("dns failure".into()),
        ]);
        let sleeper = RecordingSleeper::new();

        assert!(client(&transport, &sleeper).upload(&path, &metadata).await);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausts_after_five_attempts() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::fails_then_succeeds(10, 500);
        let sleeper = RecordingSleeper::new();

        let report = client(&transport, &sleeper)
            .upload_with_report(&path, &metadata)
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.attempts, 5);
        assert_eq!(transport.call_count(), 5);
        // No sleep after the final attempt
        assert_eq!(sleeper.delays().len(), 4);
        assert!(matches!(
            report.result,
            Err(DeliveryError::Exhausted { attempts: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal_without_request() {
        let (dir, _path, metadata) = fixture();
        let transport = MockTransport::always_succeeds();
        let sleeper = RecordingSleeper::new();

        let report = client(&transport, &sleeper)
            .upload_with_report(&dir.path().join("nope.mp3"), &metadata)
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.attempts, 0);
        assert_eq!(transport.call_count(), 0);
        assert!(matches!(report.result, Err(DeliveryError::MissingFile { .. })));
    }

    #[tokio::test]
    async fn test_client_error_after_server_error_stops() {
        let (_dir, path, metadata) = fixture();
        let transport = MockTransport::scripted([
            MockReply::Status(502, "bad gateway".into()),
            MockReply::Status(401, "unauthorized".into()),
        ]);
        let sleeper = RecordingSleeper::new();

        let report = client(&transport, &sleeper)
            .upload_with_report(&path, &metadata)
            .await;

        assert_eq!(report.attempts, 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(10)]);
        assert!(matches!(
            report.result,
            Err(DeliveryError::Http { status: 401, .. })
        ));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(2000);
        let short = truncate(&body);
        assert_eq!(short.chars().count(), MAX_LOGGED_BODY_CHARS + 3);
        assert_eq!(truncate("short"), "short");
    }
}
