//! Text chunking for TTS processing.

use anyhow::Result;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 250;

/// Bare URLs, which synthesize as noise.
static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("URL pattern is valid"));

/// Longest snippet of offending text quoted in a log line.
const LOG_SNIPPET_CHARS: usize = 80;

/// Split text into synthesis-safe chunks.
///
/// Paragraphs (newline separated) are split into sentence-like units by
/// `segment`, bare URLs are removed, and any unit still longer than
/// `max_chars` characters is broken at the last space that fits (or cut hard
/// when there is none). Units that end up empty are dropped, so blank input
/// yields no chunks.
pub fn chunk_text<F>(text: &str, max_chars: usize, mut segment: F) -> Vec<String>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let units = match segment(paragraph) {
            Ok(units) => units,
            Err(e) => {
                warn!(
                    "Sentence segmentation failed for \"{}\": {}; keeping paragraph whole",
                    snippet(paragraph),
                    e
                );
                vec![paragraph.to_string()]
            }
        };

        for unit in units {
            let unit = strip_bare_urls(&unit);
            if unit.is_empty() {
                continue;
            }
            chunks.extend(break_long_unit(&unit, max_chars));
        }
    }

    chunks
}

/// Remove bare URLs and collapse the whitespace left behind.
fn strip_bare_urls(unit: &str) -> String {
    let stripped = BARE_URL.replace_all(unit, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedily break a unit into pieces of at most `max_chars` characters.
fn break_long_unit(unit: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest: Vec<char> = unit.chars().collect();

    while rest.len() > max_chars {
        // A space at index `max_chars` still leaves a head of exactly `max_chars`.
        let split_at = rest[..=max_chars]
            .iter()
            .rposition(|c| *c == ' ')
            .filter(|&pos| pos > 0);

        let (head_end, tail_start) = match split_at {
            Some(pos) => (pos, pos + 1),
            None => (max_chars, max_chars),
        };

        let head: String = rest[..head_end].iter().collect();
        let head = head.trim();
        if !head.is_empty() {
            pieces.push(head.to_string());
        }

        rest.drain(..tail_start);
        while rest.first() == Some(&' ') {
            rest.remove(0);
        }
    }

    let tail: String = rest.iter().collect();
    let tail = tail.trim();
    if !tail.is_empty() {
        pieces.push(tail.to_string());
    }

    pieces
}

/// Shorten text for log output.
pub fn snippet(text: &str) -> String {
    if text.chars().count() <= LOG_SNIPPET_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(LOG_SNIPPET_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::seams::split_into_sentences;
    use proptest::prelude::*;

    fn whole(paragraph: &str) -> Result<Vec<String>> {
        Ok(vec![paragraph.to_string()])
    }

    #[test]
    fn test_short_sentence_kept() {
        let chunks = chunk_text("Short clean sentence.", 250, whole);
        assert_eq!(chunks, vec!["Short clean sentence."]);
    }

    #[test]
    fn test_url_removed() {
        let chunks = chunk_text("Sentence with a url https://example.com to remove.", 250, whole);
        assert_eq!(chunks, vec!["Sentence with a url to remove."]);
    }

    #[test]
    fn test_url_only_dropped() {
        assert!(chunk_text("https://just-a-url.com", 250, whole).is_empty());
        assert!(chunk_text("www.example.com/path?q=1", 250, whole).is_empty());
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk_text("", 250, whole).is_empty());
        assert!(chunk_text("   \n\n \t  ", 250, whole).is_empty());
    }

    #[test]
    fn test_long_unit_broken_at_spaces() {
        let text = "A very long sentence".repeat(20);
        let chunks = chunk_text(&text, 100, whole);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "Chunk too long: {}", chunk);
        }
        assert_eq!(
            chunks.join(" ").split_whitespace().count(),
            text.split_whitespace().count()
        );
    }

    #[test]
    fn test_break_prefers_last_space() {
        let parts = break_long_unit("one two three four five", 10);
        assert_eq!(parts, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn test_hard_cut_without_spaces() {
        let parts = break_long_unit("abcdefghij", 3);
        assert_eq!(parts, vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn test_multibyte_counted_in_chars() {
        let parts = break_long_unit("ééééé", 2);
        assert_eq!(parts, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_paragraphs_keep_order() {
        let text = "First paragraph.\n\nSecond paragraph.\nThird.";
        let chunks = chunk_text(text, 250, whole);
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph.", "Third."]);
    }

    #[test]
    fn test_segmentation_failure_keeps_paragraph() {
        let chunks = chunk_text("Kept anyway.", 250, |_| Err(anyhow::anyhow!("detector offline")));
        assert_eq!(chunks, vec!["Kept anyway."]);
    }

    #[test]
    fn test_with_sentence_detector() {
        let chunks = chunk_text("Hello world. How are you?", 250, split_into_sentences);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("Hello"));
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(200);
        assert_eq!(snippet(&long).chars().count(), LOG_SNIPPET_CHARS + 3);
        assert_eq!(snippet("short"), "short");
    }

    proptest! {
        #[test]
        fn prop_chunks_fit_max_chars(text in "[a-zA-Z .,\n]{0,600}", max_chars in 1usize..120) {
            for chunk in chunk_text(&text, max_chars, whole) {
                prop_assert!(chunk.chars().count() <= max_chars);
                prop_assert!(!chunk.trim().is_empty());
            }
        }

        #[test]
        fn prop_blank_text_has_no_chunks(text in "[ \t\n]{0,50}") {
            prop_assert!(chunk_text(&text, 250, whole).is_empty());
        }
    }
}
