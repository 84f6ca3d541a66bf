use std::fs;
use std::path::Path;

use crate::Result;

/// Script text decoded one byte per character.
///
/// Every byte maps to the code point of the same value, so arbitrary bytes inside
/// literals survive extraction and can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    text: String,
}

impl ScriptSource {
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self {
            text: raw.iter().map(|&b| char::from(b)).collect(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read(path)?;
        Ok(Self::from_bytes(&raw))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_latin1(&self.text)
    }
}

impl From<&str> for ScriptSource {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

/// Inverse of [`ScriptSource::from_bytes`]. Code points above 0xFF become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Byte offset `chars` characters past `start`, clamped to the end of `text`.
pub fn advance_chars(text: &str, start: usize, chars: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| start + offset)
}
