//! In-process phonemisation through the linked `libespeak-ng`.
//!
//! Produces the same IPA as `espeak-ng --ipa -q -v en-us`, without a child
//! process. espeak-ng keeps global state and is not thread-safe, so every
//! call goes through one process-wide lock. The data path is checked on each
//! call and the library is re-initialised when it changes.
#![cfg_attr(not(espeak_linked), allow(dead_code))]

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use crate::TtsError;

#[cfg(espeak_linked)]
use super::phonemizer::ESPEAK_VOICE;

/// The slice of the espeak-ng C API the phonemiser drives.
pub(crate) trait EspeakApi {
    /// `espeak_ng_InitializePath`, `espeak_ng_Initialize` and voice
    /// selection. `None` uses the compiled-in data directory.
    fn initialize(&mut self, data_path: Option<&CStr>) -> Result<(), TtsError>;

    /// `espeak_ng_Terminate`.
    fn terminate(&mut self);

    /// IPA for every clause of `text`, joined by single spaces.
    fn text_to_ipa(&mut self, text: &CStr) -> Result<String, TtsError>;
}

/// Initialisation state on top of an [`EspeakApi`].
pub(crate) struct Library<A> {
    api: A,
    /// Data path of the live initialisation, `None` while uninitialised.
    loaded: Option<Option<PathBuf>>,
}

impl<A: EspeakApi> Library<A> {
    pub(crate) const fn new(api: A) -> Self {
        Self { api, loaded: None }
    }

    pub(crate) fn phonemize(
        &mut self,
        text: &str,
        data_path: Option<&Path>,
    ) -> Result<String, TtsError> {
        let text = CString::new(text).map_err(|_| {
            TtsError::InvalidArgument("text contains a NUL byte".to_string())
        })?;
        self.ensure_initialized(data_path)?;
        self.api.text_to_ipa(&text)
    }

    fn ensure_initialized(&mut self, data_path: Option<&Path>) -> Result<(), TtsError> {
        match &self.loaded {
            Some(current) if current.as_deref() == data_path => return Ok(()),
            Some(_) => {
                log::info!("espeak-ng data path changed, re-initialising");
                self.api.terminate();
                self.loaded = None;
            }
            None => {}
        }

        let c_path = data_path.map(path_to_cstring).transpose()?;
        self.api.initialize(c_path.as_deref())?;
        match data_path {
            Some(p) => log::info!("espeak-ng initialised with data at {}", p.display()),
            None => log::info!("espeak-ng initialised with its default data path"),
        }
        self.loaded = Some(data_path.map(Path::to_path_buf));
        Ok(())
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, TtsError> {
    CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
        TtsError::InvalidArgument(format!(
            "espeak-ng data path contains a NUL byte: {}",
            path.display()
        ))
    })
}

#[cfg(espeak_linked)]
mod sys {
    use std::os::raw::{c_char, c_int, c_void};

    // Linking is done by build.rs.
    extern "C" {
        pub fn espeak_ng_InitializePath(path: *const c_char);
        pub fn espeak_ng_Initialize(context: *mut c_void) -> c_int;
        pub fn espeak_ng_Terminate() -> c_int;
        pub fn espeak_ng_SetVoiceByName(name: *const c_char) -> c_int;
        /// Advances `textptr` past one clause (NULL once the text is used
        /// up) and returns that clause's phonemes in a buffer owned by the
        /// library, overwritten by the next call.
        pub fn espeak_TextToPhonemes(
            textptr: *mut *const c_void,
            textmode: c_int,
            phonememode: c_int,
        ) -> *const c_char;
    }

    pub const ENS_OK: c_int = 0;
    pub const CHARS_UTF8: c_int = 1;
    pub const PHONEMES_IPA: c_int = 0x02;
}

#[cfg(espeak_linked)]
pub(crate) struct Linked;

#[cfg(espeak_linked)]
impl EspeakApi for Linked {
    fn initialize(&mut self, data_path: Option<&CStr>) -> Result<(), TtsError> {
        let voice = CString::new(ESPEAK_VOICE)
            .map_err(|_| TtsError::PhonemizerFailed("invalid voice name".to_string()))?;

        // SAFETY: the pointers are valid NUL-terminated strings for the
        // duration of each call; callers hold the library lock.
        unsafe {
            sys::espeak_ng_InitializePath(data_path.map_or(std::ptr::null(), CStr::as_ptr));

            let status = sys::espeak_ng_Initialize(std::ptr::null_mut());
            if status != sys::ENS_OK {
                return Err(TtsError::PhonemizerFailed(format!(
                    "espeak_ng_Initialize failed (status {status:#010x})"
                )));
            }

            let rc = sys::espeak_ng_SetVoiceByName(voice.as_ptr());
            if rc != sys::ENS_OK {
                sys::espeak_ng_Terminate();
                return Err(TtsError::PhonemizerFailed(format!(
                    "espeak_ng_SetVoiceByName(\"{ESPEAK_VOICE}\") failed (rc {rc})"
                )));
            }
        }
        Ok(())
    }

    fn terminate(&mut self) {
        // SAFETY: called under the library lock after a successful initialise.
        let status = unsafe { sys::espeak_ng_Terminate() };
        if status != sys::ENS_OK {
            log::warn!("espeak_ng_Terminate returned {status:#010x}");
        }
    }

    fn text_to_ipa(&mut self, text: &CStr) -> Result<String, TtsError> {
        let mut cursor = text.as_ptr() as *const std::os::raw::c_void;
        let mut clauses = Vec::new();

        while !cursor.is_null() {
            // SAFETY: `cursor` points into `text`, which outlives the loop.
            let phonemes = unsafe {
                sys::espeak_TextToPhonemes(&mut cursor, sys::CHARS_UTF8, sys::PHONEMES_IPA)
            };
            if phonemes.is_null() {
                continue;
            }
            // SAFETY: non-null result is a NUL-terminated library buffer,
            // copied before the next call.
            let clause = unsafe { CStr::from_ptr(phonemes) }
                .to_str()
                .map_err(|_| {
                    TtsError::PhonemizerFailed("espeak-ng returned non-UTF-8 phonemes".to_string())
                })?
                .trim();
            if !clause.is_empty() {
                clauses.push(clause.to_owned());
            }
        }
        Ok(clauses.join(" "))
    }
}

#[cfg(espeak_linked)]
static LIBRARY: std::sync::Mutex<Library<Linked>> = std::sync::Mutex::new(Library::new(Linked));

/// Phonemise `text` with the linked library, serialised process-wide.
#[cfg(espeak_linked)]
pub fn phonemize(text: &str, data_path: Option<&Path>) -> Result<String, TtsError> {
    LIBRARY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .phonemize(text, data_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_init: bool,
    }

    impl EspeakApi for Recorder {
        fn initialize(&mut self, data_path: Option<&CStr>) -> Result<(), TtsError> {
            let path = data_path.map_or("default".to_string(), |p| p.to_string_lossy().into_owned());
            self.calls.push(format!("init {path}"));
            if self.fail_init {
                Err(TtsError::PhonemizerFailed("no phontab".to_string()))
            } else {
                Ok(())
            }
        }

        fn terminate(&mut self) {
            self.calls.push("terminate".to_string());
        }

        fn text_to_ipa(&mut self, text: &CStr) -> Result<String, TtsError> {
            self.calls.push(format!("ipa {}", text.to_string_lossy()));
            Ok("həloʊ".to_string())
        }
    }

    #[test]
    fn initialises_once_per_data_path() {
        let mut lib = Library::new(Recorder::default());
        let bundled = Path::new("/app/espeak-ng-data");

        assert_eq!(lib.phonemize("hello", Some(bundled)).unwrap(), "həloʊ");
        lib.phonemize("again", Some(bundled)).unwrap();

        assert_eq!(
            lib.api.calls,
            ["init /app/espeak-ng-data", "ipa hello", "ipa again"]
        );
    }

    #[test]
    fn changed_data_path_reinitialises() {
        let mut lib = Library::new(Recorder::default());
        lib.phonemize("one", None).unwrap();
        lib.phonemize("two", Some(Path::new("/second"))).unwrap();
        lib.phonemize("three", Some(Path::new("/second"))).unwrap();

        assert_eq!(
            lib.api.calls,
            [
                "init default",
                "ipa one",
                "terminate",
                "init /second",
                "ipa two",
                "ipa three"
            ]
        );
    }

    #[test]
    fn failed_init_is_retried_on_next_call() {
        let mut lib = Library::new(Recorder {
            fail_init: true,
            ..Default::default()
        });
        assert!(matches!(
            lib.phonemize("hello", None),
            Err(TtsError::PhonemizerFailed(_))
        ));

        lib.api.fail_init = false;
        lib.phonemize("hello", None).unwrap();
        assert_eq!(lib.api.calls, ["init default", "init default", "ipa hello"]);
    }

    #[test]
    fn nul_bytes_are_rejected_before_the_library() {
        let mut lib = Library::new(Recorder::default());
        assert!(matches!(
            lib.phonemize("a\0b", None),
            Err(TtsError::InvalidArgument(_))
        ));
        assert!(lib.api.calls.is_empty());
    }

    #[cfg(espeak_linked)]
    #[test]
    fn linked_library_phonemizes() {
        let ipa = phonemize("Hello world", None).expect("libespeak-ng with default data");
        assert!(ipa.contains('w'), "got {ipa:?}");
    }
}
