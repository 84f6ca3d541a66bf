//! Custom-alphabet base64 decoding of string table entries.
//!
//! Obfuscators that encode their strings ship a `{["A"]=0, ...}` style table
//! near a `local x = string.char` (or `table.insert`) alias. The table is found
//! heuristically, so a lookalike table of more than the threshold size would be
//! taken as the alphabet too.

use std::fmt;

use base64::alphabet;
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashMap;

use super::expr;
use crate::lexer::{Lexer, decode_escapes};
use crate::source::advance_chars;

lazy_static! {
    static ref CHAR_ANCHOR: Regex =
        Regex::new(r"local\s+[A-Za-z0-9_]+\s*=\s*string\.char").expect("string.char anchor");
    static ref INSERT_ANCHOR: Regex =
        Regex::new(r"local\s+[A-Za-z0-9_]+\s*=\s*table\.insert").expect("table.insert anchor");
    static ref LOCAL_TABLE: Regex =
        Regex::new(r"local\s+([A-Za-z0-9_]+)\s*=\s*\{").expect("local table pattern");
}

pub const BINARY_PLACEHOLDER: &str = "<binary>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedString {
    Text(String),
    /// The encoded entry was empty.
    Empty,
    /// The decoded bytes contained no valid UTF-8 at all.
    Binary,
}

impl DecodedString {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        if !bytes.is_empty() && text.chars().all(|c| c == char::REPLACEMENT_CHARACTER) {
            return Self::Binary;
        }
        Self::Text(text.into_owned())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Empty => "",
            Self::Binary => BINARY_PLACEHOLDER,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for DecodedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol to 6-bit value table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlphabetMap {
    symbols: FxHashMap<char, u8>,
}

impl AlphabetMap {
    /// The RFC 4648 alphabet.
    pub fn standard() -> Self {
        alphabet::STANDARD
            .as_str()
            .chars()
            .zip(0u8..)
            .collect()
    }

    /// Adds a symbol. Values outside `0..=63` are refused.
    pub fn insert(&mut self, symbol: char, value: u8) -> bool {
        if value > 63 {
            return false;
        }
        self.symbols.insert(symbol, value);
        true
    }

    pub fn get(&self, symbol: char) -> Option<u8> {
        self.symbols.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Packs mapped symbols four at a time into three bytes.
    ///
    /// Unmapped symbols are ignored. `=` flushes the partial group (one byte, or
    /// two if three symbols were pending) and ends decoding. A partial group with
    /// no padding is dropped.
    pub fn decode_bytes(&self, encoded: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(encoded.len() / 4 * 3 + 2);
        let mut acc = 0u32;
        let mut pending = 0u32;

        for ch in encoded.chars() {
            if let Some(value) = self.get(ch) {
                acc |= u32::from(value) << (6 * (3 - pending));
                pending += 1;
                if pending == 4 {
                    out.extend_from_slice(&[(acc >> 16) as u8, (acc >> 8) as u8, acc as u8]);
                    acc = 0;
                    pending = 0;
                }
            } else if ch == '=' {
                out.push((acc >> 16) as u8);
                if pending == 3 {
                    out.push((acc >> 8) as u8);
                }
                break;
            }
        }

        out
    }

    pub fn decode(&self, encoded: &str) -> DecodedString {
        if encoded.is_empty() {
            return DecodedString::Empty;
        }
        DecodedString::from_bytes(&self.decode_bytes(encoded))
    }

    pub fn decode_all(&self, entries: &[String]) -> Vec<DecodedString> {
        entries.iter().map(|entry| self.decode(entry)).collect()
    }
}

impl FromIterator<(char, u8)> for AlphabetMap {
    fn from_iter<I: IntoIterator<Item = (char, u8)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (symbol, value) in iter {
            map.insert(symbol, value);
        }
        map
    }
}

/// Finds the alphabet table near the decoding block.
///
/// Every `local NAME = {` within `window` characters of the anchor is a
/// candidate; the first with more than `min_entries` usable entries wins.
pub fn locate(source: &str, window: usize, min_entries: usize) -> Option<AlphabetMap> {
    let anchor = CHAR_ANCHOR
        .find(source)
        .or_else(|| INSERT_ANCHOR.find(source))?;
    let area_end = advance_chars(source, anchor.start(), window);
    let area = &source[anchor.start()..area_end];

    for caps in LOCAL_TABLE.captures_iter(area) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let mut lexer = Lexer::at(area, whole.end() - 1);
        let Some(body) = lexer.skip_balanced() else {
            continue;
        };

        match parse_alphabet(body) {
            Some(map) if map.len() > min_entries => {
                log::debug!("[ALPHABET] `{}` accepted, {} symbols", name.as_str(), map.len());
                return Some(map);
            }
            Some(map) => {
                log::debug!("[ALPHABET] `{}` too small ({} symbols)", name.as_str(), map.len());
            }
            None => log::debug!("[ALPHABET] `{}` malformed", name.as_str()),
        }
    }

    None
}

/// Parses `key = value` entries of a table body.
///
/// Keys are `["x"]` or bare identifiers; values are arithmetic. Only
/// single-character keys with an integer value in `0..=63` are kept. Returns
/// `None` if a bracketed key is never closed.
fn parse_alphabet(body: &str) -> Option<AlphabetMap> {
    let mut map = AlphabetMap::default();
    let mut lexer = Lexer::new(body);

    loop {
        lexer.skip_whitespace();
        let Some(ch) = lexer.current_char() else {
            break;
        };

        let key = if ch == '[' {
            let (key, resume) = read_bracket_key(body, lexer.pos())?;
            lexer = Lexer::at(body, resume);
            key
        } else if let Some(ident) = lexer.read_identifier() {
            ident.to_string()
        } else {
            lexer.advance();
            continue;
        };

        while lexer
            .current_char()
            .is_some_and(|c| c.is_whitespace() || c == '=')
        {
            lexer.advance();
        }
        let value_start = lexer.pos();
        while lexer
            .current_char()
            .is_some_and(|c| !matches!(c, ',' | ';' | '}'))
        {
            lexer.advance();
        }
        let value = expr::evaluate(&body[value_start..lexer.pos()]);
        lexer.advance();

        let mut chars = key.chars();
        let (Some(symbol), None) = (chars.next(), chars.next()) else {
            continue;
        };
        if let Some(value) = value.as_exact_int().and_then(|v| u8::try_from(v).ok()) {
            map.insert(symbol, value);
        }
    }

    Some(map)
}

/// Reads `[ "k" ]` starting at the `[` at `open`. Returns the decoded key and
/// the offset just past `]`.
fn read_bracket_key(body: &str, open: usize) -> Option<(String, usize)> {
    let mut lexer = Lexer::at(body, open + 1);
    lexer.skip_whitespace();
    if let Some(literal) = lexer.read_literal().filter(|l| l.terminated) {
        lexer.skip_whitespace();
        if lexer.current_char() == Some(']') {
            lexer.advance();
            return Some((decode_escapes(literal.body), lexer.pos()));
        }
    }

    let close = open + body[open..].find(']')?;
    let raw = body[open + 1..close]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    Some((decode_escapes(raw), close + 1))
}
