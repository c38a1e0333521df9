//! Deterministic engine for exercising the boundary without model files.
//!
//! `load` wants an existing "model" file and a voices file holding one voice
//! name per line. Synthesis turns the text bytes into samples, so equal
//! inputs give byte-identical WAVs. The text `"__panic__"` panics inside the
//! engine.

use std::cell::Cell;
use std::path::Path;

use crate::{validate_speed, Result, SynthesisEngine, SynthesisParams, SynthesisResult, TtsError};

thread_local! {
    static ENGINE_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Number of voice/synthesis calls that reached a mock engine on this thread.
pub(crate) fn engine_calls() -> usize {
    ENGINE_CALLS.with(Cell::get)
}

fn record_call() {
    ENGINE_CALLS.with(|c| c.set(c.get() + 1));
}

#[derive(Default)]
pub(crate) struct MockEngine {
    voices: Option<Vec<String>>,
}

impl SynthesisEngine for MockEngine {
    type ModelParams = ();

    fn load_model_with_params(
        &mut self,
        onnx_path: &Path,
        voices_path: &Path,
        _params: (),
    ) -> Result<()> {
        if !onnx_path.is_file() {
            return Err(TtsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model not found: {}", onnx_path.display()),
            )));
        }
        let listing = std::fs::read_to_string(voices_path)?;
        let mut voices: Vec<String> = listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if voices.is_empty() {
            return Err(TtsError::VoiceParse("no voices".to_string()));
        }
        voices.sort_unstable();
        self.voices = Some(voices);
        Ok(())
    }

    fn unload_model(&mut self) {
        self.voices = None;
    }

    fn list_voices(&self) -> Result<Vec<String>> {
        record_call();
        self.voices.clone().ok_or(TtsError::ModelNotLoaded)
    }

    fn synthesize(&mut self, text: &str, params: &SynthesisParams) -> Result<SynthesisResult> {
        record_call();
        let voices = self.voices.as_ref().ok_or(TtsError::ModelNotLoaded)?;
        if !voices.contains(&params.voice) {
            return Err(TtsError::VoiceNotFound(params.voice.clone()));
        }
        validate_speed(params.speed)?;
        if text == "__panic__" {
            panic!("mock engine asked to panic");
        }

        let samples = text
            .bytes()
            .map(|b| (b as f32 / 255.0 - 0.5) * params.speed)
            .collect();
        Ok(SynthesisResult {
            samples,
            sample_rate: 24_000,
        })
    }
}
