use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::TtsError;

/// Upper bound on the buffer reserved from a zip entry's declared size.
const PREALLOC_LIMIT: usize = 16 << 20;

/// One voice: a row-major matrix of style vectors.
///
/// Row `i` is the style to use for an input of length `i`; longer inputs use
/// the last row.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl Voice {
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Style vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The style row for `idx`, clamped to the valid range.
    pub fn style_row(&self, idx: usize) -> &[f32] {
        let i = idx.min(self.rows.saturating_sub(1));
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

/// Storage for all loaded voice style matrices.
pub struct VoiceStore {
    voices: HashMap<String, Voice>,
}

impl VoiceStore {
    /// Load all voices from a .npz (numpy zip) file.
    ///
    /// Each archive entry is a `.npy` float32 matrix named after its voice
    /// (e.g. `expr-voice-2-f.npy`).
    pub fn load(path: &Path) -> Result<Self, TtsError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| TtsError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| TtsError::VoiceParse(format!("Failed to read zip entry {i}: {e}")))?;

            let raw_name = entry.name().to_string();
            if raw_name.ends_with('/') {
                continue;
            }
            let voice_name = raw_name.trim_end_matches(".npy").to_string();
            if voice_name.is_empty() {
                continue;
            }

            let declared = usize::try_from(entry.size()).unwrap_or(usize::MAX);
            let mut data = Vec::with_capacity(declared.min(PREALLOC_LIMIT));
            entry
                .read_to_end(&mut data)
                .map_err(|e| TtsError::VoiceParse(format!("Failed to read {raw_name}: {e}")))?;

            let (shape, values) = parse_npy(&data, &raw_name)?;
            voices.insert(voice_name, into_voice(shape, values, &raw_name)?);
        }

        if voices.is_empty() {
            return Err(TtsError::VoiceParse(format!(
                "{} contains no voices",
                path.display()
            )));
        }

        log::info!("Loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    pub fn get(&self, voice: &str) -> Result<&Voice, TtsError> {
        self.voices
            .get(voice)
            .ok_or_else(|| TtsError::VoiceNotFound(voice.to_string()))
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// List all available voice names in sorted order.
    pub fn list_voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn into_voice(shape: Vec<usize>, data: Vec<f32>, name: &str) -> Result<Voice, TtsError> {
    let (rows, dim) = match shape.as_slice() {
        [dim] => (1, *dim),
        [rows, dim] => (*rows, *dim),
        // [rows, 1, dim] as stored by some exporters
        [rows, 1, dim] => (*rows, *dim),
        other => {
            return Err(TtsError::VoiceParse(format!(
                "{name}: unsupported voice shape {other:?}"
            )))
        }
    };
    if rows == 0 || dim == 0 {
        return Err(TtsError::VoiceParse(format!("{name}: empty voice matrix")));
    }
    if rows.checked_mul(dim) != Some(data.len()) {
        return Err(TtsError::VoiceParse(format!(
            "{name}: {} values do not fill a {rows}x{dim} matrix",
            data.len()
        )));
    }
    Ok(Voice { rows, dim, data })
}

/// Parse a numpy .npy file into its shape and flat float32 data.
///
/// Supports format versions 1.x–3.x, C order, and float32 in either byte
/// order.
pub fn parse_npy(data: &[u8], name: &str) -> Result<(Vec<usize>, Vec<f32>), TtsError> {
    let fail = |msg: String| TtsError::VoiceParse(format!("{name}: {msg}"));

    // Verify numpy magic bytes: \x93NUMPY
    if data.len() < 10 {
        return Err(fail(format!("file too short ({} bytes)", data.len())));
    }
    if &data[0..6] != b"\x93NUMPY" {
        return Err(fail("invalid numpy magic bytes".to_string()));
    }

    // major version at [6]; header length is u16 for v1, u32 for v2+
    let (header_len, header_start) = match data[6] {
        1 => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        2 | 3 => {
            if data.len() < 12 {
                return Err(fail("header truncated".to_string()));
            }
            let len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
            (len, 12)
        }
        v => return Err(fail(format!("unsupported npy version {v}"))),
    };

    let data_offset = header_start + header_len;
    if data.len() < data_offset {
        return Err(fail(format!(
            "header truncated (need {data_offset} bytes, got {})",
            data.len()
        )));
    }
    let header = std::str::from_utf8(&data[header_start..data_offset])
        .map_err(|_| fail("header is not valid UTF-8".to_string()))?;

    let descr = header_field(header, "descr").ok_or_else(|| fail("missing 'descr'".to_string()))?;
    let big_endian = match descr {
        "<f4" | "=f4" | "|f4" => false,
        ">f4" => true,
        other => return Err(fail(format!("unsupported dtype '{other}', expected float32"))),
    };

    if header_field(header, "fortran_order") == Some("True") {
        return Err(fail("Fortran-order arrays are not supported".to_string()));
    }

    let shape = header_field(header, "shape")
        .ok_or_else(|| fail("missing 'shape'".to_string()))
        .and_then(|s| parse_shape(s).map_err(fail))?;

    let n_bytes = shape
        .iter()
        .try_fold(4usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| fail(format!("shape {shape:?} is too large")))?;
    let float_data = &data[data_offset..];
    if float_data.len() < n_bytes {
        return Err(fail(format!(
            "data section too short: expected {n_bytes} bytes, got {}",
            float_data.len()
        )));
    }

    let values = float_data[..n_bytes]
        .chunks_exact(4)
        .map(|b| {
            let bytes = [b[0], b[1], b[2], b[3]];
            if big_endian {
                f32::from_be_bytes(bytes)
            } else {
                f32::from_le_bytes(bytes)
            }
        })
        .collect();

    Ok((shape, values))
}

/// Value of `key` in the Python-literal header dict, quotes stripped.
fn header_field<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pos = header
        .find(&format!("'{key}'"))
        .or_else(|| header.find(&format!("\"{key}\"")))?;
    let rest = header[pos + key.len() + 2..].trim_start().strip_prefix(':')?.trim_start();

    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..=end])
    } else if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let inner = &rest[1..];
        inner.find(quote).map(|end| &inner[..end])
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

/// Parse `(510, 256)`, `(256,)` or `()`.
fn parse_shape(s: &str) -> Result<Vec<usize>, String> {
    s.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().map_err(|_| format!("bad shape dimension '{t}'")))
        .collect()
}
