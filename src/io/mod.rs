//! Text sources and sinks, plus encoding detection for uploaded files.
//!
//! Exported CSVs routinely arrive as Latin-1 or Windows-1252 rather than
//! UTF-8, so raw bytes go through chardet before decoding. Decoding never
//! fails: unknown encodings fall back to lossy UTF-8.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TransferError, TransferResult};

/// Decoded file content plus the encoding it was read with.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: String,
}

/// Supplies the raw input text.
pub trait TextSource {
    fn read_text(&self) -> TransferResult<DecodedText>;
}

/// Accepts a named output artifact.
pub trait TextSink {
    fn write_text(&self, name: &str, content: &str) -> TransferResult<()>;
}

// =============================================================================
// Encoding detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with a known encoding name. Unknown names fall back to
/// lossy UTF-8.
pub fn decode_text(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect and decode in one step.
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    let encoding = detect_encoding(bytes);
    let text = decode_text(bytes, &encoding);
    DecodedText { text, encoding }
}

// =============================================================================
// Filesystem implementations
// =============================================================================

/// Reads and decodes one file.
pub struct FsTextSource {
    path: PathBuf,
}

impl FsTextSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TextSource for FsTextSource {
    fn read_text(&self) -> TransferResult<DecodedText> {
        let bytes = fs::read(&self.path).map_err(|e| TransferError::Read {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(decode_bytes(&bytes))
    }
}

/// Writes named artifacts into one directory.
pub struct FsTextSink {
    dir: PathBuf,
}

impl FsTextSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TextSink for FsTextSink {
    fn write_text(&self, name: &str, content: &str) -> TransferResult<()> {
        let path = self.dir.join(name);
        fs::write(&path, content).map_err(|e| TransferError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Output artifact name for a given input name.
pub fn processed_filename(original: &str) -> String {
    format!("processed_{}", original)
}

/// Default output path for a CLI run: `processed_<name>` next to the input.
pub fn processed_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.csv");
    input.with_file_name(processed_filename(name))
}
