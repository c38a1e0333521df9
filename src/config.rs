//! espeak-ng resource location.
//!
//! Phonemisation needs the `espeak-ng-data/` directory. Desktop installs find
//! it on their own; mobile apps bundle it and must say where it lives. Engines
//! take an explicit [`EspeakConfig`]; the C boundary, which has no engine to
//! configure before the first load, goes through the process-wide path set by
//! [`set_espeak_data_path`].

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

static ESPEAK_DATA_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Set (or clear, with `None`) the process-wide `espeak-ng-data` directory.
///
/// The value is read on every phonemisation call, so a second call replaces
/// the first for all calls that start afterwards. Nothing is validated here:
/// a wrong path shows up as a synthesis error.
pub fn set_espeak_data_path(path: Option<&Path>) {
    match path {
        Some(p) => log::info!("espeak-ng data path set to {}", p.display()),
        None => log::info!("espeak-ng data path cleared, using library default"),
    }
    *ESPEAK_DATA_PATH
        .write()
        .unwrap_or_else(PoisonError::into_inner) = path.map(Path::to_path_buf);
}

/// The process-wide `espeak-ng-data` directory, if one has been set.
pub fn espeak_data_path() -> Option<PathBuf> {
    ESPEAK_DATA_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Where to find espeak-ng for a particular engine.
///
/// Either field can be `None` to fall back: `bin_path` to `espeak-ng` on PATH,
/// `data_path` to the process-wide setting and then the library default.
/// `bin_path` is unused by builds that link `libespeak-ng`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    /// The binary to spawn.
    pub fn program(&self) -> &Path {
        self.bin_path
            .as_deref()
            .unwrap_or_else(|| Path::new("espeak-ng"))
    }

    /// The data directory for a call starting now.
    pub fn resolved_data_path(&self) -> Option<PathBuf> {
        self.data_path.clone().or_else(espeak_data_path)
    }
}
