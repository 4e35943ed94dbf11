//! Where the day's newsletters come from.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::text::TextBlock;

/// Provides the text blocks for one date, in chapter order.
pub trait DigestSource: Send + Sync {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<TextBlock>>;
}

/// Reads newsletters saved as `<inbox>/<YYYY-MM-DD>/*.txt` or `*.md`.
///
/// Files are read in name order and each one becomes a block titled by the
/// file stem. A missing date directory means there is nothing for that day.
pub struct DirectorySource {
    inbox: PathBuf,
}

impl DirectorySource {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    fn newsletter_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries =
            fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"));
            if path.is_file() && is_text {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Frame a newsletter body the way it is read out.
pub fn newsletter_block(title: &str, date: NaiveDate, body: &str) -> TextBlock {
    TextBlock::new(
        title,
        format!(
            "\n\nNewsletter from: {}. Received on: {}.\n\n{}",
            title,
            date.format("%B %d, %Y"),
            body.trim()
        ),
    )
}

/// Stand-in for a newsletter that could not be read.
pub fn error_block(title: &str) -> TextBlock {
    TextBlock::new(
        format!("{} (Error)", title),
        format!("\n\n{} could not be processed and has been skipped.\n\n", title),
    )
}

impl DigestSource for DirectorySource {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<TextBlock>> {
        let dir = self.inbox.join(date.format("%Y-%m-%d").to_string());
        if !dir.is_dir() {
            info!("No inbox directory for {} at {}", date, dir.display());
            return Ok(Vec::new());
        }

        let mut blocks = Vec::new();
        for path in Self::newsletter_files(&dir)? {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            match fs::read_to_string(&path) {
                Ok(body) => {
                    debug!("Read {} ({} bytes)", path.display(), body.len());
                    blocks.push(newsletter_block(&title, date, &body));
                }
                Err(e) => {
                    error!("Failed to read newsletter {}: {}", path.display(), e);
                    blocks.push(error_block(&title));
                }
            }
        }

        info!("Found {} newsletter(s) for {}", blocks.len(), date);
        Ok(blocks)
    }
}
