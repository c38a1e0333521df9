//! KittenTTS text-to-speech engine implementation.
//!
//! Runs the KittenTTS ONNX models (nano/micro/mini) on ONNX Runtime, with
//! espeak-ng for phonemization.
//!
//! # System Requirements
//!
//! **espeak-ng** must be available:
//! - **Linux**: `sudo apt-get install espeak-ng` (or `libespeak-ng-dev` with
//!   the `espeak-lib` feature)
//! - **macOS**: `brew install espeak-ng`
//! - **iOS / Android**: cross-compile `libespeak-ng`, set `ESPEAK_LIB_DIR` at
//!   build time, bundle `espeak-ng-data/` with the app and pass its runtime
//!   location to [`crate::set_espeak_data_path`]. These targets always
//!   phonemise in-process.
//!
//! # Model Files
//!
//! ```text
//! models/kitten/
//! ├── kitten_tts_mini_v0_8.onnx   # ONNX graph
//! ├── voices.npz                  # one float32 style matrix per voice
//! └── config.json                 # optional: speed priors, voice aliases
//! ```
//!
//! Download from <https://huggingface.co/KittenML>.
//!
//! # Pipeline
//!
//! 1. Text cleaning ([`preprocess`]): numbers, money, times spelled out.
//! 2. Chunking into sentences of at most 400 characters.
//! 3. espeak-ng `en-us` IPA per chunk.
//! 4. IPA to token ids ([`vocab`]).
//! 5. Inference with the voice's style row and speed; the last 5000
//!    samples of each chunk are trimmed and chunks are concatenated.

pub mod engine;
mod espeak_lib;
pub mod model;
pub mod model_config;
pub mod phonemizer;
pub mod preprocess;
pub mod vocab;
pub mod voices;

pub use engine::{KittenEngine, KittenModelParams};
pub use model::SAMPLE_RATE;
pub use model_config::ModelConfig;
