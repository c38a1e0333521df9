//! UTF-8 buffers crossing the boundary.
//!
//! Strings handed to the host are tracked with their category until the host
//! releases them. A release through the wrong function, or of a pointer that
//! is not outstanding (already released, or never ours), is logged and
//! refused rather than freed.

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::{Result, TtsError};

/// Which release function owns a returned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCategory {
    /// Query results (voice-list JSON); released with `kittentts_free_string`.
    Info,
    /// Synthesis failures; released with `kittentts_free_error`.
    Error,
}

static OUTSTANDING: Lazy<Mutex<HashMap<usize, StringCategory>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn outstanding() -> MutexGuard<'static, HashMap<usize, StringCategory>> {
    OUTSTANDING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Allocate `s` as a NUL-terminated buffer owned by the caller.
///
/// Never returns null: for error strings null would read as success. Interior
/// NULs are replaced with U+FFFD.
pub fn into_raw(s: &str, category: StringCategory) -> *const c_char {
    let owned = CString::new(s).unwrap_or_else(|_| {
        let cleaned = s.replace('\0', "\u{FFFD}");
        CString::new(cleaned).unwrap_or_default()
    });
    let ptr = owned.into_raw();
    outstanding().insert(ptr as usize, category);
    ptr
}

/// Release a buffer previously returned by [`into_raw`] with `category`.
///
/// Returns whether the buffer was freed. Null is a no-op.
///
/// # Safety
/// If `ptr` is outstanding it must not be used after this call.
pub unsafe fn release(ptr: *const c_char, category: StringCategory) -> bool {
    if ptr.is_null() {
        return false;
    }
    {
        let mut ledger = outstanding();
        match ledger.get(&(ptr as usize)).copied() {
            Some(owner) if owner == category => {
                ledger.remove(&(ptr as usize));
            }
            Some(owner) => {
                log::error!(
                    "refusing to release a {owner:?} string through the {category:?} release function"
                );
                return false;
            }
            None => {
                log::error!("refusing to release a string that is not outstanding: {ptr:p}");
                return false;
            }
        }
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
    true
}

/// Category of `ptr` if it is still waiting to be released.
pub fn outstanding_category(ptr: *const c_char) -> Option<StringCategory> {
    outstanding().get(&(ptr as usize)).copied()
}

/// Copy a caller-owned, NUL-terminated UTF-8 argument.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated buffer valid for the
/// duration of the call.
pub unsafe fn arg(ptr: *const c_char, name: &str) -> Result<String> {
    if ptr.is_null() {
        return Err(TtsError::InvalidArgument(format!("{name} is null")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|e| TtsError::InvalidArgument(format!("{name} is not valid UTF-8: {e}")))
}
