use std::path::Path;

use ndarray::{Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::model_config::ModelConfig;
use super::phonemizer::phonemize;
use super::preprocess::clean_text;
use super::vocab::ipa_to_ids;
use super::voices::VoiceStore;
use crate::{validate_speed, EspeakConfig, TtsError};

/// Output sample rate of every KittenTTS model.
pub const SAMPLE_RATE: u32 = 24_000;

/// Samples dropped from the end of each chunk; the model ends every
/// utterance with an artifact of about this length.
pub const TAIL_TRIM: usize = 5_000;

/// Longest chunk, in characters, handed to the phonemiser.
pub const CHUNK_MAX_CHARS: usize = 400;

/// Internal KittenTTS ONNX model state.
pub struct KittenModel {
    session: Session,
    voice_store: VoiceStore,
    config: ModelConfig,
    /// Detected input name: "input_ids" or "tokens"
    tokens_input_name: String,
}

impl KittenModel {
    /// Load the ONNX graph, the voice archive and the optional `config.json`.
    pub fn load(
        onnx_path: &Path,
        voices_path: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
        config_path: Option<&Path>,
    ) -> Result<Self, TtsError> {
        if !onnx_path.is_file() {
            return Err(TtsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("ONNX model not found at {}", onnx_path.display()),
            )));
        }
        if !voices_path.is_file() {
            return Err(TtsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Voice archive not found at {}", voices_path.display()),
            )));
        }

        let config = ModelConfig::discover(onnx_path, config_path)?;

        log::info!("Loading KittenTTS model from {}", onnx_path.display());
        let session = init_session(onnx_path, num_threads, optimized_cache_path)?;
        let tokens_input_name = detect_tokens_input(&session);
        log::info!("Detected: tokens_input='{tokens_input_name}'");

        let voice_store = VoiceStore::load(voices_path)?;
        for (alias, key) in &config.voice_aliases {
            if !voice_store.contains(key) {
                log::warn!("Voice alias '{alias}' points at missing voice '{key}'");
            }
        }

        Ok(Self {
            session,
            voice_store,
            config,
            tokens_input_name,
        })
    }

    /// Archive voice names, sorted.
    pub fn list_voices(&self) -> Vec<&str> {
        self.voice_store.list_voices()
    }

    /// Map a requested voice (archive key or alias) to an archive key.
    fn voice_key(&self, voice: &str) -> Result<String, TtsError> {
        let key = self.config.resolve_voice(voice);
        if self.voice_store.contains(key) {
            Ok(key.to_string())
        } else {
            Err(TtsError::VoiceNotFound(voice.to_string()))
        }
    }

    /// Synthesize `text`: optional cleaning, chunking, phonemisation and one
    /// inference per chunk, concatenated.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
        clean: bool,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, TtsError> {
        let voice_key = self.voice_key(voice)?;
        validate_speed(speed)?;

        let text = if clean {
            clean_text(text)
        } else {
            text.to_string()
        };
        let chunks = chunk_text(&text, CHUNK_MAX_CHARS);
        if chunks.is_empty() {
            log::warn!("Nothing to synthesize after cleaning: {text:?}");
            return Ok(Vec::new());
        }
        log::debug!("Synthesizing {} chunk(s) with voice '{voice_key}'", chunks.len());

        let mut combined = Vec::new();
        for chunk in &chunks {
            let ipa = phonemize(chunk, espeak)?;
            if ipa.is_empty() {
                log::warn!("No phonemes produced for chunk: {chunk:?}");
                continue;
            }
            combined.extend(self.infer(&ipa, chunk.len(), &voice_key, speed)?);
        }
        Ok(combined)
    }

    /// Synthesize from a ready IPA string, bypassing espeak-ng.
    ///
    /// `style_idx` picks the voice style row and is clamped to the matrix;
    /// the length of the source text is a good choice, `ipa.len()` otherwise.
    pub fn generate_from_ipa(
        &mut self,
        ipa: &str,
        voice: &str,
        speed: f32,
        style_idx: usize,
    ) -> Result<Vec<f32>, TtsError> {
        let voice_key = self.voice_key(voice)?;
        validate_speed(speed)?;
        self.infer(ipa, style_idx, &voice_key, speed)
    }

    /// Run ONNX inference on one IPA chunk.
    fn infer(
        &mut self,
        ipa: &str,
        style_idx: usize,
        voice_key: &str,
        speed: f32,
    ) -> Result<Vec<f32>, TtsError> {
        let ids = ipa_to_ids(ipa);
        let seq_len = ids.len();
        let tokens_arr = Array2::from_shape_vec((1, seq_len), ids)?;

        let style = self.voice_store.get(voice_key)?.style_row(style_idx);
        let style_view = ArrayView2::from_shape((1, style.len()), style)?;

        // `speed` was range-checked by the caller; the prior is applied after
        let effective_speed = speed * self.config.speed_prior(voice_key);
        let speed_arr = ndarray::arr1(&[effective_speed]);

        let output = {
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| TtsError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        let mut samples: Vec<f32> = waveform.iter().copied().collect();
        samples.truncate(samples.len().saturating_sub(TAIL_TRIM));
        log::trace!("Chunk of {seq_len} tokens -> {} samples", samples.len());
        Ok(samples)
    }
}

/// Split text into sentences of at most `max_chars` characters, each ending
/// in punctuation.
///
/// Sentences end at `.`, `!` or `?` (kept). Longer sentences are broken at
/// word boundaries; a single word longer than `max_chars` becomes its own
/// chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    for sentence in split_sentences(text) {
        if sentence.chars().count() <= max_chars {
            chunks.push(ensure_punctuation(sentence));
            continue;
        }

        let mut current = String::new();
        let mut current_chars = 0;
        for word in sentence.split_whitespace() {
            let word_chars = word.chars().count();
            if current_chars > 0 && current_chars + 1 + word_chars > max_chars {
                chunks.push(ensure_punctuation(&current));
                current.clear();
                current_chars = 0;
            }
            if current_chars > 0 {
                current.push(' ');
                current_chars += 1;
            }
            current.push_str(word);
            current_chars += word_chars;
        }
        if current_chars > 0 {
            chunks.push(ensure_punctuation(&current));
        }
    }
    chunks
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        // "?!" and "..." stay with their sentence
        if matches!(chars.peek(), Some((_, '.' | '!' | '?'))) {
            continue;
        }
        let end = i + c.len_utf8();
        sentences.push(&text[start..end]);
        start = end;
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Append `,` unless `text` already ends in punctuation.
pub fn ensure_punctuation(text: &str) -> String {
    let text = text.trim();
    match text.chars().last() {
        None => String::new(),
        Some(c) if ".!?,;:".contains(c) => text.to_string(),
        Some(_) => format!("{text},"),
    }
}

/// Initialize an ONNX session with optional on-disk graph caching.
///
/// The first load with a cache path runs Level3 optimization and saves the
/// optimized graph there; later loads read it back with optimization
/// disabled.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, TtsError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let (load_path, opt_level, write_cache) = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!(
                "Loading pre-optimized graph ({:.1} MB) from {:?}, skipping Level3",
                cache
                    .metadata()
                    .map(|m| m.len() as f64 / 1_048_576.0)
                    .unwrap_or(0.0),
                cache
            );
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!("First load: running Level3 optimization; saving graph to {cache:?}");
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(opt_level)?
        .with_execution_providers(providers)?;

    if let Some(cache) = write_cache {
        builder = builder.with_optimized_model_path(cache)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

/// Detect the token input name ("input_ids" or "tokens") from session inputs.
fn detect_tokens_input(session: &Session) -> String {
    for input in session.inputs() {
        if input.name() == "input_ids" || input.name() == "tokens" {
            return input.name().to_string();
        }
    }
    "input_ids".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk_with_its_mark() {
        assert_eq!(chunk_text("Hello world.", 400), vec!["Hello world."]);
        assert_eq!(chunk_text("Hello world", 400), vec!["Hello world,"]);
    }

    #[test]
    fn splits_sentences_and_keeps_marks() {
        assert_eq!(
            chunk_text("Hello. World! Is it you?! Yes...", 400),
            vec!["Hello.", "World!", "Is it you?!", "Yes..."]
        );
    }

    #[test]
    fn drops_empty_and_mark_only_sentences() {
        assert!(chunk_text("", 400).is_empty());
        assert!(chunk_text("  . ! ?", 400).is_empty());
    }

    #[test]
    fn long_sentences_break_on_words() {
        let sentence = "word ".repeat(200);
        let chunks = chunk_text(&sentence, 400);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 401, "{} chars", chunk.len());
            assert!(chunk.ends_with(','));
        }
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, 200);
    }

    #[test]
    fn oversized_word_is_its_own_chunk() {
        let long = "x".repeat(20);
        let chunks = chunk_text(&format!("a {long} b"), 10);
        assert_eq!(chunks, vec!["a,".to_string(), format!("{long},"), "b,".to_string()]);
    }

    #[test]
    fn ensure_punctuation_appends_comma() {
        assert_eq!(ensure_punctuation("hello"), "hello,");
        assert_eq!(ensure_punctuation("hello. "), "hello.");
        assert_eq!(ensure_punctuation("wait;"), "wait;");
        assert_eq!(ensure_punctuation("   "), "");
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let onnx = dir.path().join("kitten_tts_mini_v0_8.onnx");
        let voices = dir.path().join("voices.npz");

        assert!(matches!(
            KittenModel::load(&onnx, &voices, None, None, None),
            Err(TtsError::Io(_))
        ));

        std::fs::write(&onnx, b"not a model").unwrap();
        assert!(matches!(
            KittenModel::load(&onnx, &voices, None, None, None),
            Err(TtsError::Io(_))
        ));
    }
}
