//! Joins per-chunk audio into one waveform and encodes it.

use super::encoder::Encoder;
use crate::tts::AudioBuffer;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// The day's audio after concatenation and encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledAudio {
    /// 16-bit PCM WAV intermediate, the source for any re-slicing
    pub lossless_path: PathBuf,
    /// MP3 encoding of the whole waveform
    pub encoded_path: PathBuf,
    /// Size of `encoded_path` in bytes
    pub encoded_size_bytes: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

/// WAV and MP3 paths `assemble` writes for `stem` inside `dir`.
pub fn output_paths(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.wav", stem)),
        dir.join(format!("{}.mp3", stem)),
    )
}

/// Concatenate buffers in order into a single buffer.
///
/// Returns `None` when there is nothing to concatenate. All buffers must share
/// a sample rate.
pub fn concatenate(buffers: &[AudioBuffer]) -> Result<Option<AudioBuffer>> {
    let Some(first) = buffers.first() else {
        return Ok(None);
    };

    let sample_rate = first.sample_rate;
    let total: usize = buffers.iter().map(|b| b.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);

    for (i, buffer) in buffers.iter().enumerate() {
        if buffer.sample_rate != sample_rate {
            anyhow::bail!(
                "Chunk {} has sample rate {} Hz, expected {} Hz",
                i,
                buffer.sample_rate,
                sample_rate
            );
        }
        samples.extend_from_slice(&buffer.samples);
    }

    Ok(Some(AudioBuffer::new(samples, sample_rate)))
}

/// Write a mono buffer as 16-bit PCM WAV.
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in &buffer.samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Assemble chunk buffers into `<stem>.wav` and `<stem>.mp3` inside `dir`.
///
/// Returns `None` when there are no buffers, which means the date produces no
/// output.
pub fn assemble(
    buffers: &[AudioBuffer],
    dir: &Path,
    stem: &str,
    encoder: &dyn Encoder,
) -> Result<Option<AssembledAudio>> {
    let Some(waveform) = concatenate(buffers)? else {
        info!("No audio chunks to assemble");
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let (lossless_path, encoded_path) = output_paths(dir, stem);

    write_wav(&waveform, &lossless_path)?;
    debug!("Wrote {}", lossless_path.display());

    encoder
        .encode(&lossless_path, &encoded_path, None)
        .context("Failed to encode MP3")?;
    let encoded_size_bytes = std::fs::metadata(&encoded_path)
        .with_context(|| format!("Encoded file missing: {}", encoded_path.display()))?
        .len();

    let assembled = AssembledAudio {
        lossless_path,
        encoded_path,
        encoded_size_bytes,
        duration_ms: waveform.duration_ms(),
    };
    info!(
        "Assembled {} ms of audio ({} bytes encoded)",
        assembled.duration_ms, assembled.encoded_size_bytes
    );
    Ok(Some(assembled))
}
