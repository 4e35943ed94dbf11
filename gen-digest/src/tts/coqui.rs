//! Coqui XTTS v2 backend using PyO3 to embed Python.
//!
//! The model is loaded once when the backend is created and reused for every
//! chunk. Voice cloning uses a reference recording; otherwise one of the
//! model's built-in speakers is used.

use super::{AudioBuffer, Synthesizer, VoiceSelector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;
use std::sync::{Arc, Once};

/// Model identifier passed to `TTS.api.TTS`.
pub const MODEL_NAME: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Initialize Python runtime once.
static PYTHON_INIT: Once = Once::new();

/// Coqui TTS backend using PyO3.
pub struct CoquiBackend {
    /// Device to use (mps, cuda, cpu)
    device: String,
    /// Language code for tokenizer and synthesis
    language: String,
    /// Loaded `TTS` object
    model: Arc<Py<PyAny>>,
    /// Output sample rate reported by the model
    sample_rate: u32,
}

impl CoquiBackend {
    /// Load the model.
    ///
    /// # Arguments
    /// * `device` - Device to use: "mps", "cuda", "cpu", or None for auto-detect
    /// * `language` - Language code, e.g. "en"
    /// * `site_packages` - Optional extra `site-packages` to make importable
    pub fn new(device: Option<&str>, language: &str, site_packages: Option<&Path>) -> Result<Self> {
        let site_packages = site_packages.map(Path::to_path_buf);
        PYTHON_INIT.call_once(|| {
            pyo3::prepare_freethreaded_python();

            if let Some(site_packages) = site_packages {
                if let Err(e) = Python::with_gil(|py| prepend_sys_path(py, &site_packages)) {
                    warn!(
                        "Could not add {} to the Python path: {}",
                        site_packages.display(),
                        e
                    );
                }
            }
        });

        let device = match device {
            Some(d) => d.to_string(),
            None => Self::detect_device()?,
        };

        info!("Loading {} on {}", MODEL_NAME, device);
        let (model, sample_rate) = Python::with_gil(|py| -> Result<(Py<PyAny>, u32)> {
            let os = py.import("os")?;
            let environ = os.getattr("environ")?;
            environ.set_item("PYTORCH_ENABLE_MPS_FALLBACK", "1")?;

            let api = py
                .import("TTS.api")
                .context("Failed to import TTS.api; is coqui-tts installed?")?;
            let tts = api
                .getattr("TTS")?
                .call1((MODEL_NAME,))
                .context("Failed to load the XTTS model")?
                .call_method1("to", (device.as_str(),))?;

            let sample_rate: u32 = tts
                .getattr("synthesizer")?
                .getattr("output_sample_rate")?
                .extract()?;

            Ok((tts.unbind(), sample_rate))
        })?;
        info!("Model ready ({} Hz)", sample_rate);

        Ok(Self {
            device,
            language: language.to_string(),
            model: Arc::new(model),
            sample_rate,
        })
    }

    /// Auto-detect the best available device.
    fn detect_device() -> Result<String> {
        Python::with_gil(|py| {
            let torch = py.import("torch").context("Failed to import torch")?;

            let backends = torch.getattr("backends")?;
            let mps = backends.getattr("mps")?;
            if mps.call_method0("is_available")?.extract::<bool>()? {
                return Ok("mps".to_string());
            }

            let cuda = torch.getattr("cuda")?;
            if cuda.call_method0("is_available")?.extract::<bool>()? {
                return Ok("cuda".to_string());
            }

            Ok("cpu".to_string())
        })
    }

    fn generate_sync(
        model: &Py<PyAny>,
        device: &str,
        language: &str,
        text: &str,
        voice: &VoiceSelector,
    ) -> Result<Vec<f32>> {
        Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("text", text)?;
            kwargs.set_item("language", language)?;
            match voice {
                VoiceSelector::Reference(path) => {
                    kwargs.set_item("speaker_wav", path.to_string_lossy().as_ref())?;
                }
                VoiceSelector::Builtin(name) => {
                    kwargs.set_item("speaker", name.as_str())?;
                }
            }

            let wav = model.bind(py).call_method("tts", (), Some(&kwargs))?;
            let wav = if wav.hasattr("tolist")? {
                wav.call_method0("tolist")?
            } else {
                wav
            };
            let samples: Vec<f32> = wav.extract().context("Unexpected waveform type")?;

            Self::cleanup_memory(py, device)?;
            Ok(samples)
        })
    }

    /// Cleanup GPU memory to mitigate leaks.
    fn cleanup_memory(py: Python<'_>, device: &str) -> Result<()> {
        let gc = py.import("gc")?;
        gc.call_method0("collect")?;

        if device == "mps" {
            let torch = py.import("torch")?;
            let mps = torch.getattr("mps")?;
            if mps.hasattr("empty_cache")? {
                mps.call_method0("empty_cache")?;
            }
        }

        Ok(())
    }
}

/// Put `dir` at the front of `sys.path`.
fn prepend_sys_path(py: Python<'_>, dir: &Path) -> PyResult<()> {
    let path = py.import("sys")?.getattr("path")?;
    path.call_method1("insert", (0, dir.to_string_lossy().as_ref()))?;
    Ok(())
}

#[async_trait]
impl Synthesizer for CoquiBackend {
    fn token_count(&self, text: &str) -> Result<usize> {
        Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("lang", self.language.as_str())?;
            let tokens = self
                .model
                .bind(py)
                .getattr("synthesizer")?
                .getattr("tts_model")?
                .getattr("tokenizer")?
                .call_method("encode", (text,), Some(&kwargs))?;
            Ok(tokens.len()?)
        })
    }

    async fn synthesize(&self, text: &str, voice: &VoiceSelector) -> Result<AudioBuffer> {
        let model = Arc::clone(&self.model);
        let device = self.device.clone();
        let language = self.language.clone();
        let text = text.to_string();
        let voice = voice.clone();

        // Run in a blocking task to not block the tokio runtime
        let samples = tokio::task::spawn_blocking(move || {
            Self::generate_sync(&model, &device, &language, &text, &voice)
        })
        .await
        .context("Task join error")??;

        debug!("Synthesized {} samples", samples.len());
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    fn device(&self) -> &str {
        &self.device
    }
}
