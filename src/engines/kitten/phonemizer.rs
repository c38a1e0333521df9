//! Text to IPA through espeak-ng.
//!
//! Builds that link `libespeak-ng` (iOS, Android, or the `espeak-lib`
//! feature) call the library in-process. Other desktop builds spawn the
//! `espeak-ng` binary.

use crate::config::EspeakConfig;
use crate::TtsError;

/// espeak-ng voice the model was trained on.
pub const ESPEAK_VOICE: &str = "en-us";

/// Convert one text chunk to an IPA string via espeak-ng.
///
/// Clauses are joined with a single space. espeak-ng does not echo
/// punctuation, so a trailing sentence mark on `text` is re-attached to the
/// IPA for the model's prosody.
pub fn phonemize(text: &str, espeak: &EspeakConfig) -> Result<String, TtsError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(String::new());
    }

    let mut ipa = text_to_ipa(text, espeak)?;

    if let Some(mark) = text.chars().last().filter(|c| ".!?,;:".contains(*c)) {
        if !ipa.is_empty() && !ipa.ends_with(mark) {
            ipa.push(mark);
        }
    }
    Ok(ipa)
}

#[cfg(espeak_linked)]
fn text_to_ipa(text: &str, espeak: &EspeakConfig) -> Result<String, TtsError> {
    super::espeak_lib::phonemize(text, espeak.resolved_data_path().as_deref())
}

#[cfg(not(espeak_linked))]
fn text_to_ipa(text: &str, espeak: &EspeakConfig) -> Result<String, TtsError> {
    let output = subprocess::run_espeak(text, espeak)?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(not(espeak_linked))]
mod subprocess {
    use std::borrow::Cow;
    use std::io::Write;
    use std::process::{Command, Stdio};

    use super::ESPEAK_VOICE;
    use crate::config::EspeakConfig;
    use crate::TtsError;

    pub(super) fn espeak_args(espeak: &EspeakConfig) -> Vec<String> {
        let mut args: Vec<String> = ["--ipa", "-q", "--stdin", "-v", ESPEAK_VOICE]
            .into_iter()
            .map(String::from)
            .collect();
        if let Some(dir) = espeak.resolved_data_path() {
            args.push(format!("--path={}", dir.display()));
        }
        args
    }

    pub(super) fn run_espeak(input: &str, espeak: &EspeakConfig) -> Result<String, TtsError> {
        let program = espeak.program();
        let args = espeak_args(espeak);
        log::trace!("Running {} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TtsError::EspeakNotFound
                } else {
                    TtsError::Io(e)
                }
            })?;

        // espeak-ng reads stdin line by line; an unterminated last line can
        // lose its final phoneme. A failed write (espeak-ng exited early) is
        // reported after the child is reaped, together with its stderr.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(canonicalize_espeak_stdin_payload(input).as_bytes()),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(TtsError::PhonemizerFailed(format!(
                "espeak-ng exited with code {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        if let Err(e) = written {
            return Err(TtsError::PhonemizerFailed(format!(
                "could not write to espeak-ng: {e}: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub(super) fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
        if input.ends_with('\n') {
            Cow::Borrowed(input)
        } else {
            Cow::Owned(format!("{input}\n"))
        }
    }
}
