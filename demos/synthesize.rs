use std::path::PathBuf;
use std::time::Instant;

use kittentts::{
    engines::kitten::{KittenEngine, KittenModelParams},
    SynthesisEngine, SynthesisParamsBuilder,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "models/kitten".to_string()),
    );
    let voice = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "expr-voice-2-f".to_string());

    let mut engine = KittenEngine::new();

    let load_start = Instant::now();
    engine.load_model_with_params(
        &model_dir.join("kitten_tts_mini_v0_8.onnx"),
        &model_dir.join("voices.npz"),
        KittenModelParams::default(),
    )?;
    println!("Model loaded in {:.2?}", load_start.elapsed());

    println!("Available voices: {:?}", engine.list_voices()?);

    let text = "Hello! This is KittenTTS, a tiny text to speech model. \
                It costs $3.50 to run 1,000 sentences at 9:30 pm.";

    let params = SynthesisParamsBuilder::default()
        .voice(voice)
        .speed(1.0_f32)
        .build()?;

    let synth_start = Instant::now();
    let result = engine.synthesize(text, &params)?;
    let synth_dur = synth_start.elapsed();

    let audio_duration = result.duration_secs();
    let speedup = audio_duration / synth_dur.as_secs_f64();
    println!(
        "Synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
        audio_duration, synth_dur, speedup
    );

    result.write_wav(&PathBuf::from("output.wav"))?;
    println!("Saved to output.wav");

    engine.unload_model();
    Ok(())
}
