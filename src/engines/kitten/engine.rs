use std::path::{Path, PathBuf};

use crate::{EspeakConfig, Result, SynthesisEngine, SynthesisParams, SynthesisResult, TtsError};

use super::model::{KittenModel, SAMPLE_RATE};

/// Parameters for configuring KittenTTS model loading.
#[derive(Debug, Clone, Default)]
pub struct KittenModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// - First load: ORT runs Level3 optimization and serialises the result here.
    /// - Subsequent loads: the pre-built graph is loaded at `Disable` optimization,
    ///   skipping re-optimization.
    ///
    /// Must be writable; app bundles usually are not.
    pub optimized_model_cache_path: Option<PathBuf>,
    /// `config.json` to read speed priors and voice aliases from. `None`
    /// looks next to the ONNX file.
    pub config_path: Option<PathBuf>,
}

/// KittenTTS text-to-speech engine.
///
/// # Quick Start
///
/// ```rust,no_run
/// use std::path::Path;
/// use kittentts::{engines::kitten::KittenEngine, SynthesisEngine, SynthesisParams};
///
/// // Uses system espeak-ng from PATH
/// let mut engine = KittenEngine::new();
/// engine.load_model(
///     Path::new("models/kitten_tts_mini_v0_8.onnx"),
///     Path::new("models/voices.npz"),
/// )?;
/// let result = engine.synthesize("Hello, world!", &SynthesisParams::new("expr-voice-2-f"))?;
/// # Ok::<(), kittentts::TtsError>(())
/// ```
///
/// # Bundled espeak-ng
///
/// ```rust,no_run
/// use kittentts::engines::kitten::KittenEngine;
/// use std::path::PathBuf;
///
/// let engine = KittenEngine::with_espeak(
///     Some(PathBuf::from("/app/resources/espeak-ng/espeak-ng")),
///     Some(PathBuf::from("/app/resources/espeak-ng-data")),
/// );
/// ```
pub struct KittenEngine {
    model: Option<KittenModel>,
    model_path: Option<PathBuf>,
    espeak: EspeakConfig,
}

impl Default for KittenEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KittenEngine {
    /// Create a new engine that uses `espeak-ng` from PATH and the
    /// process-wide data path.
    pub fn new() -> Self {
        Self {
            model: None,
            model_path: None,
            espeak: EspeakConfig::default(),
        }
    }

    /// Create a new engine with explicit espeak-ng binary and data paths.
    ///
    /// Either path can be `None` to fall back to the default.
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        Self {
            model: None,
            model_path: None,
            espeak: EspeakConfig {
                bin_path,
                data_path,
            },
        }
    }

    /// ONNX file of the loaded model.
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Synthesize from a ready IPA string, bypassing espeak-ng.
    ///
    /// See [`KittenModel::generate_from_ipa`] for `style_idx`.
    pub fn synthesize_ipa(
        &mut self,
        ipa: &str,
        params: &SynthesisParams,
        style_idx: usize,
    ) -> Result<SynthesisResult> {
        let model = self.model.as_mut().ok_or(TtsError::ModelNotLoaded)?;
        let samples = model.generate_from_ipa(ipa, &params.voice, params.speed, style_idx)?;
        Ok(SynthesisResult {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}

impl Drop for KittenEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for KittenEngine {
    type ModelParams = KittenModelParams;

    fn load_model_with_params(
        &mut self,
        onnx_path: &Path,
        voices_path: &Path,
        params: Self::ModelParams,
    ) -> Result<()> {
        let model = KittenModel::load(
            onnx_path,
            voices_path,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
            params.config_path.as_deref(),
        )?;
        self.model = Some(model);
        self.model_path = Some(onnx_path.to_path_buf());
        Ok(())
    }

    fn unload_model(&mut self) {
        if let Some(path) = self.model_path.take() {
            log::debug!("Unloading model {}", path.display());
        }
        self.model = None;
    }

    fn list_voices(&self) -> Result<Vec<String>> {
        let model = self.model.as_ref().ok_or(TtsError::ModelNotLoaded)?;
        Ok(model.list_voices().into_iter().map(String::from).collect())
    }

    fn synthesize(&mut self, text: &str, params: &SynthesisParams) -> Result<SynthesisResult> {
        let model = self.model.as_mut().ok_or(TtsError::ModelNotLoaded)?;
        let samples = model.synthesize_text(
            text,
            &params.voice,
            params.speed,
            params.clean_text,
            &self.espeak,
        )?;

        Ok(SynthesisResult {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}
