//! Live model handles.
//!
//! A handle given to a host is the address of a registry entry, never a
//! pointer the boundary dereferences. Every entry point looks the cookie up
//! here first, so a null, stale or foreign cookie is rejected instead of
//! read. The registry holds an `Arc`: freeing a handle while a call on it is
//! still running only drops the registry's reference, and the engine goes
//! away when that call returns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::{Result, SynthesisEngine, SynthesisParams};

/// Opaque model handle as seen from C. Never dereferenced.
#[repr(C)]
pub struct KittenTtsHandle {
    _private: [u8; 0],
}

/// A loaded engine, serialised behind a mutex: one call at a time per handle.
pub struct ModelHandle<E> {
    engine: Mutex<E>,
}

impl<E> ModelHandle<E> {
    fn lock(&self) -> MutexGuard<'_, E> {
        // A panic inside an earlier call was already turned into an error at
        // the boundary; keep serving the handle.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the boundary needs from a loaded model, independent of engine type.
pub trait LoadedModel: Send + Sync {
    fn voices(&self) -> Result<Vec<String>>;

    fn synthesize_to_file(&self, text: &str, wav_path: &Path, params: &SynthesisParams)
        -> Result<()>;
}

impl<E: SynthesisEngine + Send> LoadedModel for ModelHandle<E> {
    fn voices(&self) -> Result<Vec<String>> {
        self.lock().list_voices()
    }

    fn synthesize_to_file(
        &self,
        text: &str,
        wav_path: &Path,
        params: &SynthesisParams,
    ) -> Result<()> {
        self.lock().synthesize_to_file(text, wav_path, params)
    }
}

type Registry = HashMap<usize, Arc<dyn LoadedModel>>;

static LIVE: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn live() -> MutexGuard<'static, Registry> {
    LIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cookie(handle: *const KittenTtsHandle) -> usize {
    handle as usize
}

/// Take ownership of a loaded engine and hand out its cookie.
pub fn register<E: SynthesisEngine + Send + 'static>(engine: E) -> *mut KittenTtsHandle {
    let model: Arc<dyn LoadedModel> = Arc::new(ModelHandle {
        engine: Mutex::new(engine),
    });
    let address = Arc::as_ptr(&model) as *const u8 as usize;
    live().insert(address, model);
    address as *mut KittenTtsHandle
}

/// Look up a live handle. `None` for null and for cookies not (or no longer)
/// registered.
pub fn resolve(handle: *const KittenTtsHandle) -> Option<Arc<dyn LoadedModel>> {
    if handle.is_null() {
        return None;
    }
    live().get(&cookie(handle)).cloned()
}

/// Drop the registry's reference. Returns `false` if the cookie was not live.
pub fn unregister(handle: *const KittenTtsHandle) -> bool {
    let removed = live().remove(&cookie(handle));
    // The engine (if this was the last reference) drops here, outside the
    // registry lock.
    removed.is_some()
}

/// Whether `handle` currently refers to a loaded model.
pub fn is_live(handle: *const KittenTtsHandle) -> bool {
    !handle.is_null() && live().contains_key(&cookie(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::mock::MockEngine;

    #[test]
    fn register_resolve_unregister() {
        let handle = register(MockEngine::default());
        assert!(!handle.is_null());
        assert!(is_live(handle));
        assert!(resolve(handle).is_some());

        assert!(unregister(handle));
        assert!(!is_live(handle));
        assert!(resolve(handle).is_none());
        assert!(!unregister(handle), "second unregister must be refused");
    }

    #[test]
    fn null_and_foreign_cookies_resolve_to_nothing() {
        assert!(resolve(std::ptr::null()).is_none());
        let bogus = 0x10 as *const KittenTtsHandle;
        assert!(resolve(bogus).is_none());
        assert!(!is_live(bogus));
    }

    #[test]
    fn in_flight_reference_outlives_unregister() {
        let handle = register(MockEngine::default());
        let in_flight = resolve(handle).unwrap();
        assert!(unregister(handle));
        // Still usable by the call that resolved it before the free.
        assert!(matches!(
            in_flight.voices(),
            Err(crate::TtsError::ModelNotLoaded)
        ));
    }
}
