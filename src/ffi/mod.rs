//! C ABI: the contract every host binding is written against.
//!
//! Functions are `#[no_mangle] extern "C"` so Swift can call them through a
//! bridging header (`include/kittentts.h`) and the JNI adapter can call them
//! as plain functions.
//!
//! ## Memory contract
//!
//! | Function                          | Caller frees with          |
//! |-----------------------------------|----------------------------|
//! | `kittentts_model_load`            | [`kittentts_model_free`]   |
//! | [`kittentts_model_voices`]        | [`kittentts_free_string`]  |
//! | [`kittentts_synthesize_to_file`]  | [`kittentts_free_error`]   |
//!
//! `kittentts_synthesize_to_file` returns NULL on success; there is nothing
//! to free in that case.
//!
//! ## Failure shapes
//!
//! No function unwinds into the caller. Load failures return NULL and are
//! logged; query failures return NULL; synthesis failures return an owned
//! message. A panic inside the engine is caught and reported the same way.
//!
//! The generic entry points ([`load`] and friends) take the engine type as a
//! parameter so the contract can be driven with any [`SynthesisEngine`]; the
//! exported symbols bind them to the Kitten engine.

pub mod handle;
pub mod strings;

use std::ffi::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::{Result, SynthesisEngine, SynthesisParams, TtsError};

pub use handle::KittenTtsHandle;
use strings::StringCategory;

/// Run `f`, turning a panic into `fallback()` so it never crosses the boundary.
pub(crate) fn guard<T>(what: &str, fallback: impl FnOnce() -> T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{what}: internal panic: {msg}");
            fallback()
        }
    }
}

fn panic_message(what: &str) -> *const c_char {
    strings::into_raw(&format!("{what}: internal error"), StringCategory::Error)
}

/// Load an engine of type `E` and register it.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
pub unsafe fn load<E>(onnx_path: *const c_char, voices_path: *const c_char) -> *mut KittenTtsHandle
where
    E: SynthesisEngine + Default + Send + 'static,
{
    guard("model_load", std::ptr::null_mut, || {
        match unsafe { load_inner::<E>(onnx_path, voices_path) } {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("model_load failed: {e}");
                std::ptr::null_mut()
            }
        }
    })
}

unsafe fn load_inner<E>(
    onnx_path: *const c_char,
    voices_path: *const c_char,
) -> Result<*mut KittenTtsHandle>
where
    E: SynthesisEngine + Default + Send + 'static,
{
    let onnx = unsafe { strings::arg(onnx_path, "onnx_path") }?;
    let voices = unsafe { strings::arg(voices_path, "voices_path") }?;

    let mut engine = E::default();
    engine.load_model(Path::new(&onnx), Path::new(&voices))?;
    let handle = handle::register(engine);
    log::info!("Loaded model {onnx} with voices {voices} as handle {handle:p}");
    Ok(handle)
}

fn voices_json(handle: *const KittenTtsHandle) -> Result<String> {
    let model = handle::resolve(handle).ok_or(TtsError::UnknownHandle)?;
    let voices = model.voices()?;
    Ok(serde_json::to_string(&voices)?)
}

unsafe fn synthesize_inner(
    handle: *const KittenTtsHandle,
    text: *const c_char,
    voice: *const c_char,
    speed: f32,
    output_path: *const c_char,
) -> Result<()> {
    if handle.is_null() {
        return Err(TtsError::NullHandle);
    }
    let model = handle::resolve(handle).ok_or(TtsError::UnknownHandle)?;

    let text = unsafe { strings::arg(text, "text") }?;
    let voice = unsafe { strings::arg(voice, "voice") }?;
    let output = unsafe { strings::arg(output_path, "output_path") }?;

    let params = SynthesisParams {
        voice,
        speed,
        clean_text: true,
    };
    model.synthesize_to_file(&text, Path::new(&output), &params)
}

/// Set the `espeak-ng-data/` directory used by phonemisation.
///
/// Pass NULL to let espeak-ng find its compiled-in data (desktop only). Call
/// before the first load; later calls replace the path for calls that start
/// afterwards. Errors are not reported here: a bad path makes synthesis fail.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn kittentts_set_espeak_data_path(path: *const c_char) {
    guard("set_espeak_data_path", || (), || {
        if path.is_null() {
            crate::config::set_espeak_data_path(None);
            return;
        }
        match unsafe { strings::arg(path, "path") } {
            Ok(p) => crate::config::set_espeak_data_path(Some(Path::new(&p))),
            Err(e) => log::error!("set_espeak_data_path ignored: {e}"),
        }
    })
}

/// Load a KittenTTS model from an ONNX file and a voices `.npz` archive.
///
/// Returns NULL on failure (reason logged). Free with [`kittentts_model_free`].
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
#[cfg(feature = "kitten")]
#[no_mangle]
pub unsafe extern "C" fn kittentts_model_load(
    onnx_path: *const c_char,
    voices_path: *const c_char,
) -> *mut KittenTtsHandle {
    unsafe { load::<crate::engines::kitten::KittenEngine>(onnx_path, voices_path) }
}

/// Voice names as a compact JSON array, e.g. `["expr-voice-2-f","expr-voice-3-m"]`.
///
/// NULL for a null or unknown handle and on engine error. Free with
/// [`kittentts_free_string`].
///
/// # Safety
/// `model` must be null or a handle returned by `kittentts_model_load`.
#[no_mangle]
pub unsafe extern "C" fn kittentts_model_voices(model: *const KittenTtsHandle) -> *const c_char {
    if model.is_null() {
        return std::ptr::null();
    }
    guard("model_voices", std::ptr::null, || match voices_json(model) {
        Ok(json) => strings::into_raw(&json, StringCategory::Info),
        Err(e) => {
            log::error!("model_voices failed: {e}");
            std::ptr::null()
        }
    })
}

/// Synthesise `text` and write a mono 32-bit float WAV to `output_path`.
///
/// Blocks until inference completes. Returns NULL on success, otherwise an
/// error message to free with [`kittentts_free_error`]. On failure an
/// existing file at `output_path` is left as it was.
///
/// # Safety
/// `model` must be null or a handle returned by `kittentts_model_load`; the
/// string arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn kittentts_synthesize_to_file(
    model: *const KittenTtsHandle,
    text: *const c_char,
    voice: *const c_char,
    speed: f32,
    output_path: *const c_char,
) -> *const c_char {
    guard(
        "synthesize_to_file",
        || panic_message("synthesize_to_file"),
        || match unsafe { synthesize_inner(model, text, voice, speed, output_path) } {
            Ok(()) => std::ptr::null(),
            Err(e) => {
                log::warn!("synthesize_to_file failed: {e}");
                strings::into_raw(&e.to_string(), StringCategory::Error)
            }
        },
    )
}

/// Free a string returned by [`kittentts_model_voices`].
///
/// # Safety
/// `s` must be null or a string from [`kittentts_model_voices`], not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn kittentts_free_string(s: *const c_char) {
    guard("free_string", || (), || {
        unsafe { strings::release(s, StringCategory::Info) };
    })
}

/// Free an error string returned by [`kittentts_synthesize_to_file`].
///
/// # Safety
/// `s` must be null or a string from [`kittentts_synthesize_to_file`], not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn kittentts_free_error(s: *const c_char) {
    guard("free_error", || (), || {
        unsafe { strings::release(s, StringCategory::Error) };
    })
}

/// Destroy a model handle. NULL is a no-op.
///
/// # Safety
/// `model` must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn kittentts_model_free(model: *mut KittenTtsHandle) {
    if model.is_null() {
        return;
    }
    guard("model_free", || (), || {
        if handle::unregister(model) {
            log::info!("Freed model handle {model:p}");
        } else {
            log::error!("model_free: {model:p} is not a live handle");
        }
    })
}

/// Install the `env_logger` backend so load and synthesis traces reach
/// stderr. Honors `RUST_LOG`. Safe to call more than once.
#[no_mangle]
pub extern "C" fn kittentts_init_logging() {
    guard("init_logging", || (), || {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::path::PathBuf;

    use super::*;
    use crate::engines::mock::{engine_calls, MockEngine};

    struct Fixture {
        dir: tempfile::TempDir,
        onnx: CString,
        voices: CString,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let onnx = dir.path().join("kitten_tts_mini_v0_8.onnx");
        let voices = dir.path().join("voices.npz");
        std::fs::write(&onnx, b"onnx").unwrap();
        std::fs::write(&voices, "expr-voice-4-f\nexpr-voice-2-f\nexpr-voice-3-m\n").unwrap();
        Fixture {
            onnx: CString::new(onnx.to_str().unwrap()).unwrap(),
            voices: CString::new(voices.to_str().unwrap()).unwrap(),
            dir,
        }
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn out_path(f: &Fixture, name: &str) -> (PathBuf, CString) {
        let path = f.dir.path().join(name);
        let c_path = c(path.to_str().unwrap());
        (path, c_path)
    }

    unsafe fn take_error(err: *const c_char) -> Option<String> {
        if err.is_null() {
            return None;
        }
        let msg = unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned();
        unsafe { kittentts_free_error(err) };
        Some(msg)
    }

    #[test]
    fn load_query_synthesize_free() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            assert!(!handle.is_null());

            let json = kittentts_model_voices(handle);
            assert!(!json.is_null());
            assert_eq!(
                CStr::from_ptr(json).to_str().unwrap(),
                r#"["expr-voice-2-f","expr-voice-3-m","expr-voice-4-f"]"#
            );
            assert_eq!(
                strings::outstanding_category(json),
                Some(StringCategory::Info)
            );
            kittentts_free_string(json);
            assert_eq!(strings::outstanding_category(json), None);

            let (out, c_out) = out_path(&f, "out.wav");
            let err = kittentts_synthesize_to_file(
                handle,
                c("hello world").as_ptr(),
                c("expr-voice-2-f").as_ptr(),
                1.0,
                c_out.as_ptr(),
            );
            assert!(err.is_null(), "unexpected error: {:?}", take_error(err));

            let reader = hound::WavReader::open(&out).unwrap();
            assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
            assert_eq!(reader.spec().bits_per_sample, 32);

            kittentts_model_free(handle);
            assert!(!handle::is_live(handle));
        }
    }

    #[test]
    fn load_failure_returns_null() {
        unsafe {
            let handle = load::<MockEngine>(c("missing.onnx").as_ptr(), c("missing.npz").as_ptr());
            assert!(handle.is_null());
            let handle = load::<MockEngine>(std::ptr::null(), std::ptr::null());
            assert!(handle.is_null());
        }
    }

    #[test]
    fn repeated_load_free_cycles_leave_nothing_live() {
        let f = fixture();
        unsafe {
            for _ in 0..50 {
                let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
                assert!(handle::is_live(handle));
                kittentts_model_free(handle);
                assert!(!handle::is_live(handle));
            }
        }
    }

    #[test]
    fn null_handle_never_reaches_engine() {
        let before = engine_calls();
        unsafe {
            assert!(kittentts_model_voices(std::ptr::null()).is_null());

            let err = kittentts_synthesize_to_file(
                std::ptr::null(),
                c("hi").as_ptr(),
                c("expr-voice-2-f").as_ptr(),
                1.0,
                c("/tmp/never.wav").as_ptr(),
            );
            assert_eq!(take_error(err).as_deref(), Some("null model handle"));

            kittentts_model_free(std::ptr::null_mut());
        }
        assert_eq!(engine_calls(), before);
    }

    #[test]
    fn freed_handle_is_rejected() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            kittentts_model_free(handle);

            assert!(kittentts_model_voices(handle).is_null());
            let err = kittentts_synthesize_to_file(
                handle,
                c("hi").as_ptr(),
                c("expr-voice-2-f").as_ptr(),
                1.0,
                c("/tmp/never.wav").as_ptr(),
            );
            assert!(take_error(err).unwrap().contains("freed"));

            // Second free is logged and ignored.
            kittentts_model_free(handle);
        }
    }

    #[test]
    fn unknown_voice_leaves_output_untouched() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());

            let (fresh, c_fresh) = out_path(&f, "fresh.wav");
            let err = kittentts_synthesize_to_file(
                handle,
                c("hi").as_ptr(),
                c("not-a-voice").as_ptr(),
                1.0,
                c_fresh.as_ptr(),
            );
            assert!(take_error(err).unwrap().contains("not-a-voice"));
            assert!(!fresh.exists());

            let (existing, c_existing) = out_path(&f, "existing.wav");
            std::fs::write(&existing, b"previous contents").unwrap();
            let err = kittentts_synthesize_to_file(
                handle,
                c("hi").as_ptr(),
                c("not-a-voice").as_ptr(),
                1.0,
                c_existing.as_ptr(),
            );
            assert!(take_error(err).is_some());
            assert_eq!(std::fs::read(&existing).unwrap(), b"previous contents");

            kittentts_model_free(handle);
        }
    }

    #[test]
    fn out_of_range_speed_is_an_error() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            let (out, c_out) = out_path(&f, "fast.wav");
            for speed in [0.0, -1.0, 10.0, f32::NAN] {
                let err = kittentts_synthesize_to_file(
                    handle,
                    c("hi").as_ptr(),
                    c("expr-voice-2-f").as_ptr(),
                    speed,
                    c_out.as_ptr(),
                );
                assert!(take_error(err).unwrap().contains("Speed"));
            }
            assert!(!out.exists());
            kittentts_model_free(handle);
        }
    }

    #[test]
    fn null_arguments_are_errors() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            let err = kittentts_synthesize_to_file(
                handle,
                std::ptr::null(),
                c("expr-voice-2-f").as_ptr(),
                1.0,
                c("/tmp/x.wav").as_ptr(),
            );
            assert!(take_error(err).unwrap().contains("text is null"));
            kittentts_model_free(handle);
        }
    }

    #[test]
    fn repeated_synthesis_is_byte_identical() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            let (first, c_first) = out_path(&f, "first.wav");
            let (second, c_second) = out_path(&f, "second.wav");
            for target in [&c_first, &c_second] {
                let err = kittentts_synthesize_to_file(
                    handle,
                    c("hello world").as_ptr(),
                    c("expr-voice-3-m").as_ptr(),
                    1.0,
                    target.as_ptr(),
                );
                assert!(err.is_null());
            }
            assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
            kittentts_model_free(handle);
        }
    }

    #[test]
    fn engine_panic_becomes_error_and_handle_survives() {
        let f = fixture();
        unsafe {
            let handle = load::<MockEngine>(f.onnx.as_ptr(), f.voices.as_ptr());
            let (_, c_out) = out_path(&f, "panic.wav");
            let err = kittentts_synthesize_to_file(
                handle,
                c("__panic__").as_ptr(),
                c("expr-voice-2-f").as_ptr(),
                1.0,
                c_out.as_ptr(),
            );
            assert!(take_error(err).unwrap().contains("internal error"));

            let json = kittentts_model_voices(handle);
            assert!(!json.is_null());
            kittentts_free_string(json);
            kittentts_model_free(handle);
        }
    }

    #[test]
    fn error_string_cannot_be_released_as_info() {
        unsafe {
            let err = kittentts_synthesize_to_file(
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
                1.0,
                std::ptr::null(),
            );
            kittentts_free_string(err);
            assert_eq!(
                strings::outstanding_category(err),
                Some(StringCategory::Error)
            );
            kittentts_free_error(err);
            assert_eq!(strings::outstanding_category(err), None);
        }
    }
}
