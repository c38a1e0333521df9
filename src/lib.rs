//! # kittentts
//!
//! KittenTTS text-to-speech with a C ABI for hosts that cannot link Rust
//! directly: Swift/Objective-C through `include/kittentts.h`, Kotlin through
//! the JNI adapter.
//!
//! ## Features
//!
//! - **`kitten`**: the KittenTTS ONNX engine (ONNX Runtime, espeak-ng
//!   phonemisation, `.npz` voice archives) and the `kittentts_*` C exports.
//! - **`espeak-lib`**: phonemise in-process through a linked `libespeak-ng`
//!   instead of spawning the `espeak-ng` binary. iOS and Android builds
//!   always do this; see `build.rs` for how the library is found.
//! - **`jni`**: `Java_com_kittenml_kittentts_KittenTtsLib_*` exports for
//!   Android, on top of `kitten`.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kittentts = { version = "2026.10", features = ["kitten"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use kittentts::{engines::kitten::KittenEngine, SynthesisEngine, SynthesisParams};
//!
//! let mut engine = KittenEngine::new();
//! engine.load_model(
//!     Path::new("models/kitten_tts_mini_v0_8.onnx"),
//!     Path::new("models/voices.npz"),
//! )?;
//!
//! let params = SynthesisParams::new("expr-voice-2-f");
//! engine.synthesize_to_file("Hello, world!", Path::new("output.wav"), &params)?;
//! # Ok::<(), kittentts::TtsError>(())
//! ```
//!
//! ## Ownership across the C boundary
//!
//! | Produced by                      | Released with             |
//! |----------------------------------|---------------------------|
//! | `kittentts_model_load`           | `kittentts_model_free`    |
//! | `kittentts_model_voices`         | `kittentts_free_string`   |
//! | `kittentts_synthesize_to_file`   | `kittentts_free_error`    |
//!
//! See [`ffi`] for the full contract and [`adapter`] for the per-call
//! protocol every host binding follows.

pub mod adapter;
pub mod config;
pub mod engines;
pub mod error;
pub mod ffi;

use std::io::BufWriter;
use std::ops::RangeInclusive;
use std::path::Path;

use derive_builder::Builder;

pub use config::{set_espeak_data_path, EspeakConfig};
pub use error::{Result, TtsError};

/// Accepted speed multipliers. Values outside are rejected, never clamped.
pub const SPEED_RANGE: RangeInclusive<f32> = 0.5..=2.0;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for KittenTTS)
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a mono 32-bit float WAV file.
    ///
    /// The file is written next to `path` under a temporary name and renamed
    /// into place once complete, so a failed write never leaves a truncated
    /// file behind and never clobbers an existing one.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".kittentts-").suffix(".wav.part");
        // rename keeps the staging file's mode; ask for the mode a plain
        // create gets (0o666 less the umask) instead of tempfile's 0o600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let staging = builder.tempfile_in(dir)?;

        {
            let mut writer = hound::WavWriter::new(BufWriter::new(staging.as_file()), spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        staging.persist(path).map_err(|e| TtsError::Io(e.error))?;
        log::debug!(
            "Wrote {} samples ({:.2}s) to {}",
            self.samples.len(),
            self.duration_secs(),
            path.display()
        );
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Parameters for one synthesis request.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct SynthesisParams {
    /// Voice name, one of the names returned by `list_voices()`.
    pub voice: String,
    /// Speech speed multiplier, within [`SPEED_RANGE`]. Default 1.0.
    #[builder(default = "1.0")]
    pub speed: f32,
    /// Run the text preprocessor (numbers, currency, contractions, ...)
    /// before phonemisation. Default `true`.
    #[builder(default = "true")]
    pub clean_text: bool,
}

impl SynthesisParams {
    /// Parameters for `voice` at normal speed with text cleaning on.
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            speed: 1.0,
            clean_text: true,
        }
    }
}

/// Reject speeds the model was not trained for, including NaN and infinities.
pub fn validate_speed(speed: f32) -> Result<()> {
    if speed.is_finite() && SPEED_RANGE.contains(&speed) {
        Ok(())
    } else {
        Err(TtsError::SpeedOutOfRange(speed))
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// This trait defines the standard operations the C boundary drives. An
/// engine is used by one caller at a time; the boundary wraps each loaded
/// engine in a mutex.
pub trait SynthesisEngine {
    /// Parameters for configuring model loading (threads, etc.)
    type ModelParams: Default;

    /// Load a model and voice archive using default parameters.
    fn load_model(&mut self, onnx_path: &Path, voices_path: &Path) -> Result<()> {
        self.load_model_with_params(onnx_path, voices_path, Self::ModelParams::default())
    }

    /// Load a model and voice archive with custom parameters.
    fn load_model_with_params(
        &mut self,
        onnx_path: &Path,
        voices_path: &Path,
        params: Self::ModelParams,
    ) -> Result<()>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Voice names accepted by [`synthesize`](Self::synthesize).
    fn list_voices(&self) -> Result<Vec<String>>;

    /// Synthesize speech from the given text.
    fn synthesize(&mut self, text: &str, params: &SynthesisParams) -> Result<SynthesisResult>;

    /// Synthesize speech from the given text and write to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        wav_path: &Path,
        params: &SynthesisParams,
    ) -> Result<()> {
        self.synthesize(text, params)?.write_wav(wav_path)
    }
}
