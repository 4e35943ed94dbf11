use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DeliveryError, Result};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV_VAR: &str = "DIGEST_API_KEY";

/// Maximum number of upload attempts per file.
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before the second attempt; doubles after every further failure.
pub const BASE_DELAY: Duration = Duration::from_secs(10);

/// Remote store settings (the `[delivery]` table of the app config)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Base URL of the audiobook API, e.g. `https://example.com/api/v1`
    #[serde(default)]
    pub api_url: String,

    /// Bearer token (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-attempt HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DeliveryConfig {
    /// Get the API key from config, falling back to the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.clone().filter(|k| !k.is_empty()) {
            return Ok(key);
        }

        std::env::var(API_KEY_ENV_VAR).map_err(|_| DeliveryError::MissingApiKey {
            env_var: API_KEY_ENV_VAR.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with zero-based index `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert!(config.api_url.is_empty());
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
api_url = "https://digest.example.com/api/v1"
api_key = "secret"
timeout_secs = 60
"#;
        let config: DeliveryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_url, "https://digest.example.com/api/v1");
        assert_eq!(config.resolve_api_key().unwrap(), "secret");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_retry_policy_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(0), Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(20));
        assert_eq!(policy.delay_after(2), Duration::from_secs(40));
        assert_eq!(policy.delay_after(3), Duration::from_secs(80));
    }
}
