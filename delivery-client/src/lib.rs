//! Delivery client for the digest audio store
//!
//! Uploads one audio file plus its metadata per call, retrying transient
//! failures with exponential backoff:
//! - HTTP transport (multipart `audio_file` + `metadata`)
//! - Mock transport with scripted replies for tests

pub mod client;
pub mod config;
pub mod error;
pub mod metadata;
pub mod sleeper;
pub mod transport;
pub mod transports;

pub use client::{DeliveryClient, UploadReport};
pub use config::{DeliveryConfig, RetryPolicy};
pub use error::{DeliveryError, Result};
pub use metadata::Metadata;
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{TransportResponse, UploadRequest, UploadTransport};
pub use transports::{HttpTransport, MockReply, MockTransport};
