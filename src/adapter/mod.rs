//! Host-side half of the boundary.
//!
//! Every host binding does the same thing per call: turn host strings into
//! NUL-terminated UTF-8, call the C function, copy any returned string back
//! into a host string, and release every buffer exactly once. This module is
//! that protocol, written once against the C functions in [`crate::ffi`]; a
//! host adapter only converts between its own string type and `&str` /
//! `String` and carries the handle as a [`Cookie`].
//!
//! Ownership on each call:
//! - [`CallerOwnedString`]: built from a host string for the duration of one
//!   call, released when dropped, so every exit path releases it.
//! - [`EngineOwnedString`]: returned by the C side, copied with
//!   [`EngineOwnedString::into_string`] and released through the function
//!   matching its category.
//! - A zero cookie never reaches the C side.

#[cfg(feature = "jni")]
pub mod jni;

use std::ffi::{c_char, CStr, CString};
use std::ptr::NonNull;

use crate::ffi::{self, strings::StringCategory, KittenTtsHandle};
use crate::{Result, SynthesisEngine, TtsError};

/// Model handle as a host integer (`jlong` on the JVM). 0 means no handle.
pub type Cookie = i64;

/// Message returned by [`synthesize_to_file`] for a zero cookie.
pub const NULL_HANDLE_MESSAGE: &str = "null model handle";

pub fn handle_to_cookie(handle: *const KittenTtsHandle) -> Cookie {
    handle as usize as Cookie
}

pub fn cookie_to_handle(cookie: Cookie) -> *mut KittenTtsHandle {
    cookie as usize as *mut KittenTtsHandle
}

/// A NUL-terminated copy of a host string, alive for one call.
#[derive(Debug)]
pub struct CallerOwnedString(CString);

impl CallerOwnedString {
    /// Fails on interior NUL, which cannot be passed through the C contract.
    pub fn new(s: &str) -> Result<Self> {
        CString::new(s)
            .map(Self)
            .map_err(|e| TtsError::InvalidArgument(format!("string contains NUL: {e}")))
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0.as_ptr()
    }
}

/// A string returned by the C side. Released on drop through the function
/// for its category.
#[derive(Debug)]
pub struct EngineOwnedString {
    ptr: NonNull<c_char>,
    category: StringCategory,
}

impl EngineOwnedString {
    /// Take ownership of `ptr`; `None` for null.
    ///
    /// # Safety
    /// `ptr` must be null or a string just returned by the C function whose
    /// release function matches `category`, not owned by anyone else.
    pub unsafe fn from_raw(ptr: *const c_char, category: StringCategory) -> Option<Self> {
        NonNull::new(ptr as *mut c_char).map(|ptr| Self { ptr, category })
    }

    /// Copy into a host-side `String`, then release the buffer.
    pub fn into_string(self) -> String {
        // Copy first; `self` is released when it goes out of scope below.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for EngineOwnedString {
    fn drop(&mut self) {
        let ptr = self.ptr.as_ptr() as *const c_char;
        unsafe {
            match self.category {
                StringCategory::Info => ffi::kittentts_free_string(ptr),
                StringCategory::Error => ffi::kittentts_free_error(ptr),
            }
        }
    }
}

/// Set or clear the process-wide `espeak-ng-data` directory.
pub fn set_espeak_data_path(path: Option<&str>) {
    let owned = match path.map(CallerOwnedString::new).transpose() {
        Ok(owned) => owned,
        Err(e) => {
            log::error!("set_espeak_data_path: {e}");
            return;
        }
    };
    let ptr = owned.as_ref().map_or(std::ptr::null(), CallerOwnedString::as_ptr);
    unsafe { ffi::kittentts_set_espeak_data_path(ptr) };
}

/// Load a model with engine `E`. Returns 0 on failure.
pub fn model_load<E>(onnx_path: &str, voices_path: &str) -> Cookie
where
    E: SynthesisEngine + Default + Send + 'static,
{
    let (onnx, voices) = match (
        CallerOwnedString::new(onnx_path),
        CallerOwnedString::new(voices_path),
    ) {
        (Ok(onnx), Ok(voices)) => (onnx, voices),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("model_load: {e}");
            return 0;
        }
    };

    log::info!("model_load: onnx={onnx_path} voices={voices_path}");
    let handle = unsafe { ffi::load::<E>(onnx.as_ptr(), voices.as_ptr()) };
    if handle.is_null() {
        log::error!("model_load returned NULL");
    }
    handle_to_cookie(handle)
}

/// Destroy the model behind `cookie`. 0 is a no-op.
pub fn model_free(cookie: Cookie) {
    unsafe { ffi::kittentts_model_free(cookie_to_handle(cookie)) };
}

/// Voice names as a JSON array, or `None` for a zero cookie or on error.
pub fn model_voices(cookie: Cookie) -> Option<String> {
    if cookie == 0 {
        return None;
    }
    let json = unsafe { ffi::kittentts_model_voices(cookie_to_handle(cookie)) };
    unsafe { EngineOwnedString::from_raw(json, StringCategory::Info) }
        .map(EngineOwnedString::into_string)
}

/// Synthesise to a WAV file. `None` on success, otherwise the error message.
pub fn synthesize_to_file(
    cookie: Cookie,
    text: &str,
    voice: &str,
    speed: f32,
    output_path: &str,
) -> Option<String> {
    if cookie == 0 {
        return Some(NULL_HANDLE_MESSAGE.to_string());
    }

    let args = CallerOwnedString::new(text).and_then(|text| {
        let voice = CallerOwnedString::new(voice)?;
        let output = CallerOwnedString::new(output_path)?;
        Ok((text, voice, output))
    });
    let (text, voice, output) = match args {
        Ok(args) => args,
        Err(e) => return Some(e.to_string()),
    };

    let err = unsafe {
        ffi::kittentts_synthesize_to_file(
            cookie_to_handle(cookie),
            text.as_ptr(),
            voice.as_ptr(),
            speed,
            output.as_ptr(),
        )
    };
    drop((text, voice, output));

    unsafe { EngineOwnedString::from_raw(err, StringCategory::Error) }
        .map(EngineOwnedString::into_string)
}
