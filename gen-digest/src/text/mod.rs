//! Text processing for TTS: normalization, chunking, and sentence splitting.

pub mod chunker;
pub mod normalize;
mod seams;

pub use chunker::chunk_text;
pub use normalize::{clean_text, normalize_blocks};
pub use seams::split_into_sentences;

/// A titled run of text; one block becomes one chapter of the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// Chapter title
    pub title: String,
    /// Text to be spoken
    pub text: String,
}

impl TextBlock {
    /// Create a new text block.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Whether the block has nothing to speak.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_block_creation() {
        let block = TextBlock::new("Morning Brew", "Hello world".to_string());
        assert_eq!(block.title, "Morning Brew");
        assert_eq!(block.text, "Hello world");
        assert!(!block.is_blank());
    }

    #[test]
    fn test_blank_block() {
        assert!(TextBlock::new("Empty", " \n\t ").is_blank());
    }
}
