use serde::Serialize;

use crate::deobfuscate::{Extraction, Strategy};

/// Short strings that are still worth showing because scripts commonly use them.
pub const NOTABLE_NAMES: &[&str] = &[
    "game",
    "StarterGui",
    "SetCore",
    "Info",
    "Title",
    "Text",
    "Duration",
    "SendNotification",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedString {
    pub index: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub strategy: Strategy,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_unavailable: Option<String>,
    pub strings: Vec<IndexedString>,
}

impl FileReport {
    /// Builds a report keeping original indices. With `show_all` unset only
    /// [`is_displayable`] strings are listed.
    pub fn new(path: impl Into<String>, extraction: &Extraction, show_all: bool) -> Self {
        let strings = extraction
            .strings
            .iter()
            .enumerate()
            .filter(|(_, s)| show_all || is_displayable(s))
            .map(|(index, value)| IndexedString {
                index,
                value: value.clone(),
            })
            .collect();

        Self {
            path: path.into(),
            strategy: extraction.strategy,
            count: extraction.strings.len(),
            hybrid_unavailable: extraction.hybrid_unavailable.as_ref().map(ToString::to_string),
            strings,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("Processing {}...\n", self.path);
        out.push_str(&format!("  Found {} strings.\n", self.count));
        out.push_str("  Decrypted strings:\n");
        for entry in &self.strings {
            out.push_str(&format!("    [{}] {}\n", entry.index, entry.value));
        }
        out
    }
}

/// Longer than three characters and entirely printable, or a notable name.
pub fn is_displayable(s: &str) -> bool {
    if NOTABLE_NAMES.contains(&s) {
        return true;
    }
    s.chars().count() > 3 && s.chars().all(is_printable)
}

fn is_printable(c: char) -> bool {
    c == ' ' || !(c.is_control() || c.is_whitespace() || c == char::REPLACEMENT_CHARACTER)
}
