//! Per-date orchestration: text to chunks to speech to parts to the store.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use delivery_client::DeliveryClient;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::assembler::{AssembledAudio, assemble, output_paths};
use crate::audio::chapters::{Chapter, PART_START_TITLE, full_chapters};
use crate::audio::encoder::Encoder;
use crate::audio::partition::{Part, encode_parts, partition, plan_parts};
use crate::cleanup::ArtifactCleaner;
use crate::config::DigestConfig;
use crate::source::DigestSource;
use crate::text::chunker::snippet;
use crate::text::{TextBlock, chunk_text, clean_text, normalize_blocks};
use crate::tts::{AudioBuffer, Synthesizer, VoiceSelector};

/// Title the store knows a date's digest by.
pub fn digest_title(date: NaiveDate) -> String {
    format!("Daily Digest for {}", date.format("%Y-%m-%d"))
}

/// Whether `existing` already holds the digest titled `title`, whole or split.
pub fn already_delivered(title: &str, existing: &[String]) -> bool {
    let part_prefix = format!("{} (Part ", title);
    existing
        .iter()
        .any(|t| t == title || (t.starts_with(&part_prefix) && t.ends_with(')')))
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_chunk_chars: usize,
    pub max_chunk_tokens: usize,
    pub max_part_size_mb: f64,
    pub work_dir: PathBuf,
    pub show_progress: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            max_chunk_chars: config.max_chunk_chars,
            max_chunk_tokens: config.max_chunk_tokens,
            max_part_size_mb: config.max_part_size_mb,
            work_dir: config.work_dir(),
            show_progress: true,
        }
    }
}

/// How a date ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    /// Every part reached the store
    Delivered { parts: usize },
    /// Nothing to speak for the date
    Empty,
    /// The store already has this digest
    AlreadyDelivered,
    Failed(String),
}

impl fmt::Display for DateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateOutcome::Delivered { parts } => write!(f, "delivered ({} part(s))", parts),
            DateOutcome::Empty => write!(f, "nothing to deliver"),
            DateOutcome::AlreadyDelivered => write!(f, "already delivered"),
            DateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DateReport {
    pub date: NaiveDate,
    pub outcome: DateOutcome,
}

impl DateReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, DateOutcome::Failed(_))
    }
}

/// Owns the engine and collaborators for a run and processes dates one at a time.
pub struct DigestPipeline {
    synthesizer: Box<dyn Synthesizer>,
    encoder: Box<dyn Encoder>,
    delivery: DeliveryClient,
    source: Box<dyn DigestSource>,
    cleaner: Box<dyn ArtifactCleaner>,
    voice: VoiceSelector,
    settings: PipelineSettings,
}

impl DigestPipeline {
    pub fn new(
        synthesizer: Box<dyn Synthesizer>,
        encoder: Box<dyn Encoder>,
        delivery: DeliveryClient,
        source: Box<dyn DigestSource>,
        cleaner: Box<dyn ArtifactCleaner>,
        voice: VoiceSelector,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            synthesizer,
            encoder,
            delivery,
            source,
            cleaner,
            voice,
            settings,
        }
    }

    /// Process every date in order. A failed date never stops the ones after it.
    pub async fn run_batch(&self, dates: &[NaiveDate], skip_existing: bool) -> Vec<DateReport> {
        let existing = if skip_existing {
            match self.delivery.existing_titles().await {
                Ok(titles) => titles,
                Err(e) => {
                    warn!("Could not list existing digests, processing anyway: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut reports = Vec::with_capacity(dates.len());
        for &date in dates {
            let title = digest_title(date);
            let outcome = if already_delivered(&title, &existing) {
                info!("\"{}\" already exists; skipping (use --force to redo)", title);
                DateOutcome::AlreadyDelivered
            } else {
                match self.process_date(date).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("{} failed: {:#}", date, e);
                        DateOutcome::Failed(format!("{:#}", e))
                    }
                }
            };
            info!("{}: {}", date, outcome);
            reports.push(DateReport { date, outcome });
        }
        reports
    }

    /// Produce and deliver the digest for one date, then clean up its files.
    pub async fn process_date(&self, date: NaiveDate) -> Result<DateOutcome> {
        let mut artifacts = Vec::new();
        let outcome = self.produce_and_deliver(date, &mut artifacts).await;
        if !artifacts.is_empty() {
            self.cleaner.cleanup(&artifacts);
        }
        outcome
    }

    async fn produce_and_deliver(
        &self,
        date: NaiveDate,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<DateOutcome> {
        let title = digest_title(date);
        info!("Building \"{}\"", title);

        let blocks = self
            .source
            .fetch(date)
            .with_context(|| format!("Failed to fetch newsletters for {}", date))?;
        let blocks = normalize_blocks(&blocks);
        if blocks.iter().all(TextBlock::is_blank) {
            info!("No newsletter text for {}", date);
            return Ok(DateOutcome::Empty);
        }

        let chunks = self.chunk_blocks(&blocks);
        if chunks.is_empty() {
            info!("Nothing to synthesize for {}", date);
            return Ok(DateOutcome::Empty);
        }

        let buffers = self.synthesize_chunks(&chunks).await;
        let stem = format!("digest_{}", date.format("%Y-%m-%d"));
        let (wav, mp3) = output_paths(&self.settings.work_dir, &stem);
        artifacts.extend([wav, mp3]);
        let Some(audio) = assemble(&buffers, &self.settings.work_dir, &stem, self.encoder.as_ref())?
        else {
            info!("No audio produced for {}", date);
            return Ok(DateOutcome::Empty);
        };

        let chapters = full_chapters(audio.duration_ms, &blocks);
        let parts = plan_parts(
            &audio,
            &title,
            &chapters,
            self.settings.max_part_size_mb,
            &self.settings.work_dir,
        )?;
        artifacts.extend(
            parts
                .iter()
                .filter(|p| p.filepath != audio.encoded_path)
                .map(|p| p.filepath.clone()),
        );
        encode_parts(&parts, &audio, self.encoder.as_ref())?;

        deliver_parts(&self.delivery, &parts).await?;
        Ok(DateOutcome::Delivered { parts: parts.len() })
    }

    /// Clean and chunk every block in order.
    ///
    /// Cleanup only shapes what is spoken; chapter timing uses the blocks as given.
    pub fn chunk_blocks(&self, blocks: &[TextBlock]) -> Vec<String> {
        blocks
            .iter()
            .flat_map(|block| {
                let text = clean_text(&block.text);
                chunk_text(&text, self.settings.max_chunk_chars, |paragraph| {
                    self.synthesizer.segment_sentences(paragraph)
                })
            })
            .collect()
    }

    /// Synthesize chunks in order, skipping any that exceed the token ceiling
    /// or fail.
    pub async fn synthesize_chunks(&self, chunks: &[String]) -> Vec<AudioBuffer> {
        let pb = if self.settings.show_progress {
            ProgressBar::new(chunks.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let max_tokens = self.settings.max_chunk_tokens;
        let mut buffers = Vec::with_capacity(chunks.len());
        let mut skipped = 0;

        for chunk in chunks {
            pb.inc(1);
            match self.synthesizer.token_count(chunk) {
                Ok(tokens) if tokens > max_tokens => {
                    warn!(
                        "Skipping chunk of {} tokens (limit {}): \"{}\"",
                        tokens,
                        max_tokens,
                        snippet(chunk)
                    );
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Could not tokenize \"{}\": {}; skipping", snippet(chunk), e);
                    skipped += 1;
                    continue;
                }
                Ok(_) => {}
            }

            match self.synthesizer.synthesize(chunk, &self.voice).await {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    warn!("Synthesis failed for \"{}\": {}; skipping", snippet(chunk), e);
                    skipped += 1;
                }
            }
        }

        pb.finish_with_message(format!("{} synthesized, {} skipped", buffers.len(), skipped));
        info!(
            "Synthesized {}/{} chunks on {}",
            buffers.len(),
            chunks.len(),
            self.synthesizer.device()
        );
        buffers
    }
}

/// Upload parts in order, stopping at the first that fails.
pub async fn deliver_parts(delivery: &DeliveryClient, parts: &[Part]) -> Result<()> {
    for (i, part) in parts.iter().enumerate() {
        if !delivery.upload(&part.filepath, &part.metadata).await {
            anyhow::bail!(
                "Upload of \"{}\" failed (part {} of {}); stopping further uploads",
                part.metadata.title,
                i + 1,
                parts.len()
            );
        }
    }
    Ok(())
}

/// Upload an existing MP3, splitting it into `archive_dir` when too large.
///
/// Returns the number of parts uploaded.
pub async fn upload_existing(
    file: &Path,
    title: Option<&str>,
    max_part_size_mb: f64,
    archive_dir: &Path,
    encoder: &dyn Encoder,
    delivery: &DeliveryClient,
) -> Result<usize> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let size = fs::metadata(file)?.len();
    let duration_ms = encoder
        .duration_ms(file)
        .with_context(|| format!("Failed to probe {}", file.display()))?;
    info!(
        "{}: {:.2} MB, {} s",
        file.display(),
        size as f64 / (1024.0 * 1024.0),
        duration_ms / 1000
    );

    let title = match title {
        Some(t) => t.to_string(),
        None => format!(
            "Manual Upload: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        ),
    };

    fs::create_dir_all(archive_dir)
        .with_context(|| format!("Failed to create {}", archive_dir.display()))?;

    let audio = AssembledAudio {
        lossless_path: file.to_path_buf(),
        encoded_path: file.to_path_buf(),
        encoded_size_bytes: size,
        duration_ms,
    };
    let chapters = vec![Chapter::new(PART_START_TITLE, 0)];
    let parts = partition(
        &audio,
        &title,
        &chapters,
        max_part_size_mb,
        archive_dir,
        encoder,
    )?;

    deliver_parts(delivery, &parts).await?;
    Ok(parts.len())
}
