//! Sentence splitting using the seams library (dialog-aware).

use anyhow::{Result, anyhow};
use seams::sentence_detector::dialog_detector::SentenceDetectorDialog;
use std::sync::OnceLock;

/// Global detector instance; `None` if it failed to initialize.
static DETECTOR: OnceLock<Option<SentenceDetectorDialog>> = OnceLock::new();

fn detector() -> Result<&'static SentenceDetectorDialog> {
    DETECTOR
        .get_or_init(|| SentenceDetectorDialog::new().ok())
        .as_ref()
        .ok_or_else(|| anyhow!("seams sentence detector failed to initialize"))
}

/// Split a paragraph into sentences.
pub fn split_into_sentences(text: &str) -> Result<Vec<String>> {
    let sentences = detector()?
        .detect_sentences_borrowed(text)
        .map_err(|e| anyhow!("sentence detection failed: {:?}", e))?;

    Ok(sentences
        .iter()
        .map(|s| s.normalize())
        .filter(|s| !s.is_empty())
        .collect())
}
