use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::TtsError;

/// Model types this engine can drive.
pub const SUPPORTED_MODEL_TYPES: &[&str] = &["ONNX1", "ONNX2"];

/// Contents of the `config.json` published next to a KittenTTS model.
///
/// Every field is optional; a model without a config behaves as if all
/// maps were empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "type", default)]
    pub model_type: Option<String>,
    /// File name of the ONNX graph the config was written for.
    #[serde(default)]
    pub model_file: Option<String>,
    /// File name of the voice archive.
    #[serde(default)]
    pub voices: Option<String>,
    /// Per-voice speed multiplier, applied on top of the requested speed.
    ///
    /// The requested speed is what [`crate::SPEED_RANGE`] bounds; the prior
    /// is model calibration and can take the model input past that range.
    #[serde(default)]
    pub speed_priors: HashMap<String, f32>,
    /// Friendly voice names mapped to archive keys.
    #[serde(default)]
    pub voice_aliases: HashMap<String, String>,
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, TtsError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TtsError::Config(format!("{}: {e}", path.display())))?;

        if let Some(kind) = &config.model_type {
            if !SUPPORTED_MODEL_TYPES.contains(&kind.as_str()) {
                return Err(TtsError::Config(format!(
                    "{}: unsupported model type '{kind}'",
                    path.display()
                )));
            }
        }
        if let Some((voice, prior)) = config
            .speed_priors
            .iter()
            .find(|(_, prior)| !(prior.is_finite() && **prior > 0.0))
        {
            return Err(TtsError::Config(format!(
                "{}: speed prior {prior} for '{voice}' must be a positive number",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Load `explicit` if given, else `config.json` beside the ONNX file if
    /// present, else the empty config.
    pub fn discover(onnx_path: &Path, explicit: Option<&Path>) -> Result<Self, TtsError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path(onnx_path) {
                Some(path) if path.is_file() => path,
                _ => {
                    log::debug!("No config.json next to {}", onnx_path.display());
                    return Ok(Self::default());
                }
            },
        };

        log::info!("Loading model config from {}", path.display());
        let config = Self::load(&path)?;

        let onnx_name = onnx_path.file_name().and_then(|n| n.to_str());
        if let (Some(expected), Some(actual)) = (config.model_file.as_deref(), onnx_name) {
            if expected != actual {
                log::warn!("config.json names model '{expected}' but '{actual}' was loaded");
            }
        }
        Ok(config)
    }

    /// Archive key for `voice`, following aliases.
    pub fn resolve_voice<'a>(&'a self, voice: &'a str) -> &'a str {
        self.voice_aliases
            .get(voice)
            .map(String::as_str)
            .unwrap_or(voice)
    }

    /// Speed multiplier for an archive key, 1.0 when none is configured.
    pub fn speed_prior(&self, voice_key: &str) -> f32 {
        self.speed_priors.get(voice_key).copied().unwrap_or(1.0)
    }
}

fn default_config_path(onnx_path: &Path) -> Option<PathBuf> {
    onnx_path.parent().map(|dir| dir.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "name": "Kitten TTS Mini",
        "type": "ONNX2",
        "model_file": "kitten_tts_mini_v0_8.onnx",
        "voices": "voices.npz",
        "speed_priors": { "expr-voice-2-f": 0.8 },
        "voice_aliases": { "Bella": "expr-voice-2-f" }
    }"#;

    #[test]
    fn parses_published_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, CONFIG).unwrap();

        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.model_type.as_deref(), Some("ONNX2"));
        assert_eq!(config.voices.as_deref(), Some("voices.npz"));
        assert_eq!(config.resolve_voice("Bella"), "expr-voice-2-f");
        assert_eq!(config.resolve_voice("expr-voice-3-m"), "expr-voice-3-m");
        assert_eq!(config.speed_prior("expr-voice-2-f"), 0.8);
        assert_eq!(config.speed_prior("expr-voice-3-m"), 1.0);
    }

    #[test]
    fn discovers_config_beside_model() {
        let dir = tempfile::tempdir().unwrap();
        let onnx = dir.path().join("kitten_tts_mini_v0_8.onnx");
        assert_eq!(
            ModelConfig::discover(&onnx, None).unwrap(),
            ModelConfig::default()
        );

        std::fs::write(dir.path().join("config.json"), CONFIG).unwrap();
        let config = ModelConfig::discover(&onnx, None).unwrap();
        assert_eq!(config.voice_aliases.len(), 1);
    }

    #[test]
    fn rejects_unknown_type_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{ "type": "PYTORCH" }"#).unwrap();
        assert!(matches!(ModelConfig::load(&path), Err(TtsError::Config(_))));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ModelConfig::load(&path), Err(TtsError::Config(_))));
    }

    #[test]
    fn rejects_non_positive_speed_prior() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        for prior in ["0.0", "-1.2"] {
            std::fs::write(
                &path,
                format!(r#"{{ "speed_priors": {{ "expr-voice-2-f": {prior} }} }}"#),
            )
            .unwrap();
            assert!(matches!(ModelConfig::load(&path), Err(TtsError::Config(_))));
        }
    }

    #[test]
    fn explicit_path_must_exist() {
        let onnx = Path::new("models/kitten_tts_mini_v0_8.onnx");
        assert!(matches!(
            ModelConfig::discover(onnx, Some(Path::new("missing/config.json"))),
            Err(TtsError::Io(_))
        ));
    }
}
