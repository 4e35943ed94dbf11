//! gen-digest configuration management.

use anyhow::{Context, Result};
use delivery_client::DeliveryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::audio::partition::DEFAULT_MAX_PART_SIZE_MB;
use crate::text::chunker::DEFAULT_MAX_CHARS;
use crate::tts::{DEFAULT_MAX_TOKENS, DEFAULT_SPEAKER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Reference recording (6-15 s WAV) to clone; falls back to the built-in speaker
    #[serde(default)]
    pub reference_voice: Option<PathBuf>,

    /// Built-in speaker used without a reference voice
    #[serde(default = "default_speaker")]
    pub default_speaker: String,

    /// Language code for tokenizer and synthesis
    #[serde(default = "default_language")]
    pub language: String,

    /// Device to use (mps, cuda, cpu). None means auto-detect.
    #[serde(default)]
    pub device: Option<String>,

    /// Extra Python site-packages holding coqui-tts and torch
    #[serde(default)]
    pub python_site_packages: Option<PathBuf>,

    /// Maximum characters per synthesized chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Chunks tokenizing to more than this are skipped
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,

    /// Per-file upload ceiling in megabytes
    #[serde(default = "default_max_part_size_mb")]
    pub max_part_size_mb: f64,

    /// Directory holding one sub-directory of newsletters per date
    #[serde(default)]
    pub inbox_dir: Option<PathBuf>,

    /// Scratch directory for WAV and MP3 files
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Keep uploaded MP3s here instead of deleting them
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_speaker() -> String {
    DEFAULT_SPEAKER.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_max_chunk_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_max_part_size_mb() -> f64 {
    DEFAULT_MAX_PART_SIZE_MB
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            reference_voice: None,
            default_speaker: default_speaker(),
            language: default_language(),
            device: None,
            python_site_packages: None,
            max_chunk_chars: default_max_chunk_chars(),
            max_chunk_tokens: default_max_chunk_tokens(),
            max_part_size_mb: default_max_part_size_mb(),
            inbox_dir: None,
            work_dir: None,
            archive_dir: None,
            delivery: DeliveryConfig::default(),
        }
    }
}

impl DigestConfig {
    /// Get the config file path: ~/.config/cli-programs/gen-digest.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home
            .join(".config")
            .join("cli-programs")
            .join("gen-digest.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DigestConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Inbox directory, defaulting to ~/digest-inbox
    pub fn inbox_dir(&self) -> Result<PathBuf> {
        match &self.inbox_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::home_dir()
                .context("Could not determine home directory")?
                .join("digest-inbox")),
        }
    }

    /// Scratch directory, defaulting to the user cache directory
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("gen-digest")
        })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            anyhow::bail!("max_chunk_chars must be at least 1");
        }
        if self.max_chunk_tokens == 0 {
            anyhow::bail!("max_chunk_tokens must be at least 1");
        }
        if !(self.max_part_size_mb > 0.0 && self.max_part_size_mb.is_finite()) {
            anyhow::bail!(
                "max_part_size_mb must be a positive number, got {}",
                self.max_part_size_mb
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DigestConfig::default();
        assert_eq!(config.default_speaker, "Claribel Dervla");
        assert_eq!(config.language, "en");
        assert_eq!(config.max_chunk_chars, 250);
        assert_eq!(config.max_chunk_tokens, 400);
        assert_eq!(config.max_part_size_mb, 15.0);
        assert!(config.reference_voice.is_none());
        assert!(config.device.is_none());
        assert_eq!(config.delivery.timeout_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = DigestConfig::config_path().unwrap();
        assert!(path.ends_with("cli-programs/gen-digest.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
reference_voice = "/path/to/voice.wav"
device = "cuda"
max_part_size_mb = 9.5
inbox_dir = "/srv/inbox"
archive_dir = "/srv/archive"

[delivery]
api_url = "https://digest.example.com/api/v1"
api_key = "secret"
"#;
        let config: DigestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.reference_voice, Some(PathBuf::from("/path/to/voice.wav")));
        assert_eq!(config.device, Some("cuda".to_string()));
        assert_eq!(config.max_part_size_mb, 9.5);
        assert_eq!(config.inbox_dir().unwrap(), PathBuf::from("/srv/inbox"));
        assert_eq!(config.archive_dir, Some(PathBuf::from("/srv/archive")));
        assert_eq!(config.delivery.api_url, "https://digest.example.com/api/v1");
        assert_eq!(config.delivery.api_key, Some("secret".to_string()));
        assert_eq!(config.delivery.timeout_secs, 300);
        assert_eq!(config.max_chunk_chars, 250);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: DigestConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_chunk_tokens, 400);
        assert!(config.delivery.api_url.is_empty());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = DigestConfig::default();
        config.reference_voice = Some(PathBuf::from("/voices/me.wav"));
        config.delivery.api_url = "https://x.test".to_string();

        let parsed: DigestConfig =
            toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(parsed.reference_voice, config.reference_voice);
        assert_eq!(parsed.delivery.api_url, "https://x.test");
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let config = DigestConfig {
            max_part_size_mb: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
