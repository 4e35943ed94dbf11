//! Splitting oversized audio into parts that fit the upload ceiling.

use super::assembler::AssembledAudio;
use super::chapters::{Chapter, chapters_json, chunk_chapters};
use super::encoder::Encoder;
use anyhow::{Context, Result};
use delivery_client::Metadata;
use log::info;
use std::path::{Path, PathBuf};

/// Default per-file ceiling in megabytes.
pub const DEFAULT_MAX_PART_SIZE_MB: f64 = 15.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One uploadable file.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub filepath: PathBuf,
    pub metadata: Metadata,
    /// Range of the full timeline this part covers
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Encoded size in megabytes.
pub fn size_mb(size_bytes: u64) -> f64 {
    size_bytes as f64 / BYTES_PER_MB
}

/// Number of parts needed to keep each under `max_part_size_mb`.
pub fn part_count(size_bytes: u64, max_part_size_mb: f64) -> u64 {
    let size = size_mb(size_bytes);
    if size <= max_part_size_mb {
        1
    } else {
        (size / max_part_size_mb).ceil() as u64
    }
}

/// Cut `[0, total_ms)` into `count` slices of `ceil(total_ms / count)`.
///
/// Slices that would start at or past the end are not produced, so very short
/// audio can yield fewer slices than requested.
pub fn slice_ranges(total_ms: u64, count: u64) -> Vec<(u64, u64)> {
    let count = count.max(1);
    let len = total_ms.div_ceil(count).max(1);
    (0..count)
        .map(|i| (i * len, ((i + 1) * len).min(total_ms)))
        .filter(|&(start, end)| start < end)
        .collect()
}

/// Work out the parts for assembled audio without encoding anything.
///
/// Audio at or under the ceiling is a single part: the already encoded file.
/// Larger audio is cut into equal time slices named
/// `<stem>_part_<i>_of_<n>.mp3` inside `out_dir`.
pub fn plan_parts(
    audio: &AssembledAudio,
    title: &str,
    chapters: &[Chapter],
    max_part_size_mb: f64,
    out_dir: &Path,
) -> Result<Vec<Part>> {
    if max_part_size_mb <= 0.0 || !max_part_size_mb.is_finite() {
        anyhow::bail!("Maximum part size must be positive, got {}", max_part_size_mb);
    }

    let count = part_count(audio.encoded_size_bytes, max_part_size_mb);
    if count == 1 {
        let metadata = Metadata::new(title, audio.duration_ms / 1000, chapters_json(chapters));
        return Ok(vec![Part {
            filepath: audio.encoded_path.clone(),
            metadata,
            start_ms: 0,
            end_ms: audio.duration_ms,
        }]);
    }

    info!(
        "{:.2} MB exceeds the {} MB ceiling; splitting into {} parts",
        size_mb(audio.encoded_size_bytes),
        max_part_size_mb,
        count
    );

    let stem = audio
        .encoded_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "digest".to_string());

    let ranges = slice_ranges(audio.duration_ms, count);
    if ranges.is_empty() {
        anyhow::bail!(
            "{} has no measurable duration; cannot split it into {} parts",
            audio.encoded_path.display(),
            count
        );
    }
    let n = ranges.len();
    let parts = ranges
        .into_iter()
        .enumerate()
        .map(|(i, (start_ms, end_ms))| {
            let number = i + 1;
            let metadata = Metadata::new(
                format!("{} (Part {} of {})", title, number, n),
                (end_ms - start_ms) / 1000,
                chapters_json(&chunk_chapters(chapters, start_ms, end_ms)),
            );
            Part {
                filepath: out_dir.join(format!("{}_part_{}_of_{}.mp3", stem, number, n)),
                metadata,
                start_ms,
                end_ms,
            }
        })
        .collect();

    Ok(parts)
}

/// Encode every planned part that is not the whole encoded file itself.
pub fn encode_parts(parts: &[Part], audio: &AssembledAudio, encoder: &dyn Encoder) -> Result<()> {
    for part in parts {
        if part.filepath == audio.encoded_path {
            continue;
        }
        let size = encoder
            .encode(
                &audio.lossless_path,
                &part.filepath,
                Some((part.start_ms, part.end_ms)),
            )
            .with_context(|| format!("Failed to encode {}", part.filepath.display()))?;
        info!(
            "Encoded {} ({:.2} MB)",
            part.filepath.display(),
            size_mb(size)
        );
    }
    Ok(())
}

/// Plan and encode the parts for assembled audio.
pub fn partition(
    audio: &AssembledAudio,
    title: &str,
    chapters: &[Chapter],
    max_part_size_mb: f64,
    out_dir: &Path,
    encoder: &dyn Encoder,
) -> Result<Vec<Part>> {
    let parts = plan_parts(audio, title, chapters, max_part_size_mb, out_dir)?;
    encode_parts(&parts, audio, encoder)?;
    Ok(parts)
}
