use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Upload file not found: {}", .path.display())]
    MissingFile { path: PathBuf },

    #[error("API key not found. Set {env_var} environment variable or add it to the [delivery] config.")]
    MissingApiKey { env_var: String },

    #[error("Server responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upload failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Whether another attempt could succeed.
    ///
    /// 5xx responses and transport-level failures (timeouts, refused
    /// connections, DNS) are transient; everything else is final.
    pub fn is_retriable(&self) -> bool {
        match self {
            DeliveryError::Http { status, .. } => (500..600).contains(status),
            DeliveryError::Transport(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retriable() {
        for status in [500, 502, 503, 599] {
            let err = DeliveryError::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_retriable(), "HTTP {} should be retriable", status);
        }
    }

    #[test]
    fn test_client_errors_are_fatal() {
        for status in [400, 401, 403, 404, 413, 301] {
            let err = DeliveryError::Http {
                status,
                body: String::new(),
            };
            assert!(!err.is_retriable(), "HTTP {} should be fatal", status);
        }
    }

    #[test]
    fn test_transport_is_retriable_missing_file_is_not() {
        assert!(DeliveryError::Transport("connection refused".into()).is_retriable());
        assert!(
            !DeliveryError::MissingFile {
                path: PathBuf::from("/tmp/missing.mp3")
            }
            .is_retriable()
        );
    }

    #[test]
    fn test_http_error_message_includes_status() {
        let err = DeliveryError::Http {
            status: 403,
            body: "Forbidden".into(),
        };
        assert_eq!(err.to_string(), "Server responded with HTTP 403: Forbidden");
    }
}
