//! JNI exports for `com.kittenml.kittentts.KittenTtsLib`.
//!
//! Kotlin side:
//!
//! ```kotlin
//! object KittenTtsLib {
//!     init { System.loadLibrary("kittentts") }
//!     external fun nativeSetEspeakDataPath(path: String?)
//!     external fun nativeModelLoad(onnxPath: String, voicesPath: String): Long
//!     external fun nativeModelFree(handle: Long)
//!     external fun nativeModelVoices(handle: Long): String?
//!     external fun nativeSynthesizeToFile(
//!         handle: Long, text: String, voice: String, speed: Float, outputPath: String,
//!     ): String?
//! }
//! ```
//!
//! The handle is a [`Cookie`](super::Cookie) stored in a `Long`; 0 means
//! none. `nativeSynthesizeToFile` blocks for the whole inference, so call it
//! off the main thread.
//!
//! Java strings are read with `GetStringUTFChars` through [`JavaStr`], which
//! releases them on drop, and copied before the adapter call. Failures to
//! read or create Java strings are logged and mapped to the same null /
//! error-message results as engine failures.

use jni::errors::Error as JniError;
use jni::objects::{JClass, JString};
use jni::strings::JavaStr;
use jni::sys::{jfloat, jlong, jstring};
use jni::JNIEnv;

use crate::engines::kitten::KittenEngine;
use crate::ffi::guard;

/// Copy a Java string. `Ok(None)` for a Java `null`.
fn read_string(env: &mut JNIEnv, s: &JString) -> Result<Option<String>, JniError> {
    if s.is_null() {
        return Ok(None);
    }
    let utf: JavaStr = env.get_string(s)?;
    Ok(Some(utf.into()))
}

fn required_string(env: &mut JNIEnv, s: &JString, name: &str) -> Result<String, String> {
    require(read_string(env, s), name)
}

/// A required argument, or the error message the caller receives instead.
fn require(read: Result<Option<String>, JniError>, name: &str) -> Result<String, String> {
    match read {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(format!("{name} is null")),
        Err(e) => Err(format!("cannot read {name}: {e}")),
    }
}

/// A new Java string, or null if the JVM could not allocate one.
fn to_java(env: &mut JNIEnv, s: &str) -> jstring {
    match env.new_string(s) {
        Ok(js) => js.into_raw(),
        Err(e) => {
            log::error!("NewStringUTF failed: {e}");
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_com_kittenml_kittentts_KittenTtsLib_nativeSetEspeakDataPath<
    'local,
>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    path: JString<'local>,
) {
    guard("nativeSetEspeakDataPath", || (), || {
        match read_string(&mut env, &path) {
            Ok(path) => super::set_espeak_data_path(path.as_deref()),
            Err(e) => log::error!("nativeSetEspeakDataPath: cannot read path: {e}"),
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_com_kittenml_kittentts_KittenTtsLib_nativeModelLoad<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    onnx_path: JString<'local>,
    voices_path: JString<'local>,
) -> jlong {
    guard("nativeModelLoad", || 0, || {
        let paths = required_string(&mut env, &onnx_path, "onnxPath").and_then(|onnx| {
            required_string(&mut env, &voices_path, "voicesPath").map(|voices| (onnx, voices))
        });
        match paths {
            Ok((onnx, voices)) => super::model_load::<KittenEngine>(&onnx, &voices),
            Err(e) => {
                log::error!("nativeModelLoad: {e}");
                0
            }
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_com_kittenml_kittentts_KittenTtsLib_nativeModelFree<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
) {
    guard("nativeModelFree", || (), || super::model_free(handle))
}

#[no_mangle]
pub extern "system" fn Java_com_kittenml_kittentts_KittenTtsLib_nativeModelVoices<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
) -> jstring {
    guard("nativeModelVoices", std::ptr::null_mut, || {
        match super::model_voices(handle) {
            Some(json) => to_java(&mut env, &json),
            None => std::ptr::null_mut(),
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_com_kittenml_kittentts_KittenTtsLib_nativeSynthesizeToFile<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
    text: JString<'local>,
    voice: JString<'local>,
    speed: jfloat,
    output_path: JString<'local>,
) -> jstring {
    if handle == 0 {
        return to_java(&mut env, super::NULL_HANDLE_MESSAGE);
    }

    let outcome = guard(
        "nativeSynthesizeToFile",
        || Some("synthesize_to_file: internal error".to_string()),
        || {
            let args = required_string(&mut env, &text, "text").and_then(|text| {
                let voice = required_string(&mut env, &voice, "voice")?;
                let output = required_string(&mut env, &output_path, "outputPath")?;
                Ok((text, voice, output))
            });
            match args {
                Ok((text, voice, output)) => {
                    super::synthesize_to_file(handle, &text, &voice, speed, &output)
                }
                Err(e) => Some(e),
            }
        },
    );

    match outcome {
        None => std::ptr::null_mut(),
        Some(message) => to_java(&mut env, &message),
    }
}
