//! Chapter markers estimated from text length.

use crate::text::TextBlock;
use serde_json::{Map, Value};

/// Title of the marker used when a part has no chapter to name it after.
pub const PART_START_TITLE: &str = "Part Start";

/// A chapter marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Chapter title
    pub title: String,
    /// Start position in milliseconds
    pub start_time_ms: u64,
}

impl Chapter {
    /// Create a new chapter.
    pub fn new(title: impl Into<String>, start_time_ms: u64) -> Self {
        Self {
            title: title.into(),
            start_time_ms,
        }
    }
}

/// One chapter per block, placed proportionally to the characters that come
/// before it.
///
/// Block `i` starts at `floor(chars_before_i / total_chars * total_ms)`. When
/// there is no text at all every chapter starts at 0.
pub fn full_chapters(total_ms: u64, blocks: &[TextBlock]) -> Vec<Chapter> {
    let lengths: Vec<u128> = blocks
        .iter()
        .map(|b| b.text.chars().count() as u128)
        .collect();
    let total_chars: u128 = lengths.iter().sum();

    let mut cumulative = 0u128;
    blocks
        .iter()
        .zip(&lengths)
        .map(|(block, &len)| {
            let start = if total_chars == 0 {
                0
            } else {
                (cumulative * total_ms as u128 / total_chars) as u64
            };
            cumulative += len;
            Chapter::new(block.title.clone(), start)
        })
        .collect()
}

/// Chapters for the `[start_ms, end_ms)` slice of the timeline, rebased so the
/// slice starts at 0.
///
/// The result always has a chapter at 0. If no retained chapter starts exactly
/// at the slice start, a marker is prepended, named after the first retained
/// chapter, or, when none is retained, after the chapter already playing at
/// `start_ms`.
pub fn chunk_chapters(chapters: &[Chapter], start_ms: u64, end_ms: u64) -> Vec<Chapter> {
    let mut retained: Vec<Chapter> = chapters
        .iter()
        .filter(|c| c.start_time_ms >= start_ms && c.start_time_ms < end_ms)
        .map(|c| Chapter::new(c.title.clone(), c.start_time_ms - start_ms))
        .collect();

    if retained.first().is_some_and(|c| c.start_time_ms == 0) {
        return retained;
    }

    let title = match retained.first() {
        Some(first) => first.title.clone(),
        None => chapters
            .iter()
            .rfind(|c| c.start_time_ms < start_ms)
            .map(|c| c.title.clone())
            .unwrap_or_else(|| PART_START_TITLE.to_string()),
    };

    retained.insert(0, Chapter::new(title, 0));
    retained
}

/// Serialize chapters as a JSON object of title to start second.
///
/// Keys keep insertion order; a repeated title keeps its first position but
/// takes the later start time.
pub fn chapters_json(chapters: &[Chapter]) -> String {
    let mut map = Map::new();
    for chapter in chapters {
        map.insert(
            chapter.title.clone(),
            Value::from(chapter.start_time_ms / 1000),
        );
    }
    Value::Object(map).to_string()
}
