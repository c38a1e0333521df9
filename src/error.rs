/// Errors produced by the engines and the binding layer.
///
/// At the C boundary these are never propagated as values: they are rendered
/// with `Display` into an owned error string (or logged, for load failures).
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[cfg(feature = "kitten")]
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "kitten")]
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, or build with the `espeak-lib` feature"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found. Call list_voices() to see available voices.")]
    VoiceNotFound(String),
    #[error("Speed {0} is outside the supported range {min}..={max}", min = crate::SPEED_RANGE.start(), max = crate::SPEED_RANGE.end())]
    SpeedOutOfRange(f32),
    #[error("null model handle")]
    NullHandle,
    #[error("unknown or already freed model handle")]
    UnknownHandle,
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T, E = TtsError> = std::result::Result<T, E>;
