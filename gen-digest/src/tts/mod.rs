//! Speech synthesis trait and types.

pub mod coqui;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

use crate::text::split_into_sentences;

/// Hard ceiling on tokens per chunk; the engine truncates or fails beyond it.
pub const DEFAULT_MAX_TOKENS: usize = 400;

/// Built-in speaker used when no reference voice is available.
pub const DEFAULT_SPEAKER: &str = "Claribel Dervla";

/// Mono audio produced for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Which voice the engine speaks with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelector {
    /// Clone the voice in this reference recording
    Reference(PathBuf),
    /// Use one of the engine's built-in speakers
    Builtin(String),
}

impl VoiceSelector {
    /// Pick the reference voice if it is configured and exists, otherwise the
    /// built-in speaker.
    pub fn select(reference: Option<&Path>, default_speaker: &str) -> Self {
        match reference {
            Some(path) if path.is_file() => {
                info!("Using reference voice: {}", path.display());
                VoiceSelector::Reference(path.to_path_buf())
            }
            Some(path) => {
                info!(
                    "Reference voice {} not found; using default built-in speaker: {}",
                    path.display(),
                    default_speaker
                );
                VoiceSelector::Builtin(default_speaker.to_string())
            }
            None => {
                info!("Using default built-in speaker: {}", default_speaker);
                VoiceSelector::Builtin(default_speaker.to_string())
            }
        }
    }
}

/// Speech synthesis engine.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Split a paragraph into sentence-like units.
    fn segment_sentences(&self, paragraph: &str) -> Result<Vec<String>> {
        split_into_sentences(paragraph)
    }

    /// Number of engine tokens the text encodes to.
    fn token_count(&self, text: &str) -> Result<usize>;

    /// Synthesize one chunk of text.
    async fn synthesize(&self, text: &str, voice: &VoiceSelector) -> Result<AudioBuffer>;

    /// Device being used (mps, cuda, cpu).
    fn device(&self) -> &str;
}

/// Create the synthesis engine.
///
/// # Arguments
/// * `device` - Device to use: "mps", "cuda", "cpu", or None for auto-detect
/// * `language` - Language code passed to the tokenizer and the model
/// * `site_packages` - Extra Python `site-packages` directory to put on `sys.path`
pub fn create_backend(
    device: Option<&str>,
    language: &str,
    site_packages: Option<&Path>,
) -> Result<Box<dyn Synthesizer>> {
    Ok(Box::new(coqui::CoquiBackend::new(
        device,
        language,
        site_packages,
    )?))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 24000], 24000);
        assert_eq!(buffer.duration_ms(), 1000);
        assert_eq!(AudioBuffer::new(vec![0.0; 10], 0).duration_ms(), 0);
    }

    #[test]
    fn test_select_existing_reference() {
        let file = NamedTempFile::new().unwrap();
        let voice = VoiceSelector::select(Some(file.path()), DEFAULT_SPEAKER);
        assert_eq!(voice, VoiceSelector::Reference(file.path().to_path_buf()));
    }

    #[test]
    fn test_select_missing_reference_falls_back() {
        let voice = VoiceSelector::select(Some(Path::new("/no/such/voice.wav")), DEFAULT_SPEAKER);
        assert_eq!(voice, VoiceSelector::Builtin("Claribel Dervla".to_string()));
    }

    #[test]
    fn test_select_unconfigured() {
        let voice = VoiceSelector::select(None, "Ana Florence");
        assert_eq!(voice, VoiceSelector::Builtin("Ana Florence".to_string()));
    }

    #[tokio::test]
    async fn test_mock_records_spoken_text() {
        let synth = mock::MockSynthesizer::new().failing_on("bad");
        let voice = VoiceSelector::Builtin(DEFAULT_SPEAKER.to_string());

        let buffer = synth.synthesize("hello", &voice).await.unwrap();
        assert_eq!(buffer.samples.len(), 50);
        assert!(synth.synthesize("bad", &voice).await.is_err());
        assert_eq!(synth.spoken(), vec!["hello"]);
    }
}
