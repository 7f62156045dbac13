/*!
 * Document text extraction.
 *
 * Only plain text and Markdown are read natively. PDF and EPUB are recognized
 * so the caller gets a clear error instead of garbage.
 */

use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::InputError;
use crate::file_utils::{FileManager, FileType};

/// Encoding a document was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    /// Fallback for bytes that are not valid UTF-8
    Windows1252,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-bom",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Windows1252 => "windows-1252",
        };
        f.write_str(name)
    }
}

/// Text extracted from an input file
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub encoding: TextEncoding,
    pub source_path: PathBuf,
}

impl RawDocument {
    /// Document built from in-memory text
    pub fn from_text(text: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self { text: text.into(), encoding: TextEncoding::Utf8, source_path: source_path.into() }
    }
}

/// Turns a file into raw text
pub trait DocumentExtractor: Send + Sync {
    /// Whether this extractor handles the file
    fn supports(&self, path: &Path) -> bool;

    /// Extract the document text
    fn extract_text(&self, path: &Path) -> Result<RawDocument, InputError>;
}

/// Extractor for `.txt`, `.text` and `.md` files
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        FileManager::detect_file_type(path) == FileType::Text
    }

    fn extract_text(&self, path: &Path) -> Result<RawDocument, InputError> {
        match FileManager::detect_file_type(path) {
            FileType::Text => {}
            FileType::Pdf => {
                return Err(InputError::UnsupportedFormat(format!(
                    "PDF extraction is not built in; convert {:?} to text first",
                    path
                )));
            }
            FileType::Epub => {
                return Err(InputError::UnsupportedFormat(format!(
                    "EPUB extraction is not built in; convert {:?} to text first",
                    path
                )));
            }
            FileType::Unknown => {
                return Err(InputError::UnsupportedFormat(format!("{:?}", path)));
            }
        }

        let bytes = std::fs::read(path).map_err(|e| InputError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let (text, encoding) = decode(&bytes)?;
        debug!("Read {:?} as {} ({} bytes)", path, encoding, bytes.len());

        Ok(RawDocument { text, encoding, source_path: path.to_path_buf() })
    }
}

/// Decode bytes: BOMs first, then UTF-8, then Windows-1252
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), InputError> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = String::from_utf8(rest.to_vec())
            .map_err(|e| InputError::Extraction(format!("invalid UTF-8 after BOM: {}", e)))?;
        return Ok((text, TextEncoding::Utf8Bom));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes).map(|t| (t, TextEncoding::Utf16Le));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes).map(|t| (t, TextEncoding::Utf16Be));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text.to_string(), TextEncoding::Utf8)),
        Err(_) => Ok((bytes.iter().map(|b| windows_1252_char(*b)).collect(), TextEncoding::Windows1252)),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, InputError> {
    if bytes.len() % 2 != 0 {
        return Err(InputError::Extraction("odd byte count in UTF-16 text".to_string()));
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]])).collect();
    String::from_utf16(&units).map_err(|e| InputError::Extraction(format!("invalid UTF-16: {}", e)))
}

/// Windows-1252 differs from Latin-1 only in 0x80..=0x9F
fn windows_1252_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž',
        '\u{8F}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}',
        'ž', 'Ÿ',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}
