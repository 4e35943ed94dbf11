//! MP3 encoding and probing with FFmpeg.

use std::path::Path;
use std::process::{Command, Output};
use thiserror::Error;

/// Failures from the external encoder tools.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {stderr}")]
    Failed { tool: &'static str, stderr: String },

    #[error("could not parse duration {0:?}")]
    BadDuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Compressed-audio encoder.
pub trait Encoder: Send + Sync {
    /// Encode `input` (or the `[start_ms, end_ms)` range of it) into `output`,
    /// returning the size of the written file in bytes.
    fn encode(&self, input: &Path, output: &Path, range: Option<(u64, u64)>) -> Result<u64>;

    /// Duration of an audio file in milliseconds.
    fn duration_ms(&self, input: &Path) -> Result<u64>;
}

/// Encoder backed by the `ffmpeg` and `ffprobe` executables on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    bitrate: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            bitrate: "128k".to_string(),
        }
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if both tools are available.
    pub fn is_available() -> bool {
        ["ffmpeg", "ffprobe"].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }
}

fn run(tool: &'static str, cmd: &mut Command) -> Result<Output> {
    let output = cmd
        .output()
        .map_err(|source| EncodeError::Spawn { tool, source })?;

    if !output.status.success() {
        return Err(EncodeError::Failed {
            tool,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Format milliseconds as an ffmpeg seconds argument.
fn seconds_arg(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, input: &Path, output: &Path, range: Option<(u64, u64)>) -> Result<u64> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-i"]).arg(input);
        if let Some((start_ms, end_ms)) = range {
            cmd.args(["-ss", &seconds_arg(start_ms), "-to", &seconds_arg(end_ms)]);
        }
        cmd.args(["-vn", "-c:a", "libmp3lame", "-b:a", &self.bitrate])
            .arg(output);

        run("ffmpeg", &mut cmd)?;
        Ok(std::fs::metadata(output)?.len())
    }

    fn duration_ms(&self, input: &Path) -> Result<u64> {
        let output = run(
            "ffprobe",
            Command::new("ffprobe")
                .args([
                    "-v",
                    "quiet",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                ])
                .arg(input),
        )?;

        let duration_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let duration_secs: f64 = duration_str
            .parse()
            .map_err(|_| EncodeError::BadDuration(duration_str.clone()))?;

        Ok((duration_secs * 1000.0) as u64)
    }
}

#[cfg(test)]
pub mod fake {
    //! Encoder that writes placeholder files of a chosen size.

    use super::*;
    use std::sync::{Arc, Mutex};

    /// Writes `bytes_per_ms` bytes per millisecond of requested range; a full
    /// encode writes `full_size` bytes.
    #[derive(Clone)]
    pub struct FakeEncoder {
        pub full_size: u64,
        pub bytes_per_ms: u64,
        pub duration_ms: u64,
        calls: Arc<Mutex<Vec<Option<(u64, u64)>>>>,
    }

    impl FakeEncoder {
        pub fn new(full_size: u64, duration_ms: u64) -> Self {
            Self {
                full_size,
                bytes_per_ms: 1,
                duration_ms,
                calls: Arc::default(),
            }
        }

        /// Ranges requested so far; `None` is a full encode.
        pub fn calls(&self) -> Vec<Option<(u64, u64)>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Encoder for FakeEncoder {
        fn encode(&self, _input: &Path, output: &Path, range: Option<(u64, u64)>) -> Result<u64> {
            self.calls.lock().unwrap().push(range);
            let size = match range {
                Some((start, end)) => (end - start) * self.bytes_per_ms,
                None => self.full_size,
            };
            let file = std::fs::File::create(output)?;
            file.set_len(size)?;
            Ok(size)
        }

        fn duration_ms(&self, _input: &Path) -> Result<u64> {
            Ok(self.duration_ms)
        }
    }
}
