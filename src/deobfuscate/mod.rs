pub mod alphabet;
pub mod expr;
pub mod hybrid;
pub mod interpreter;
pub mod shuffle;
pub mod signature;
pub mod string_table;

use std::fmt;

use serde::Serialize;

use crate::options::Options;
use crate::source::ScriptSource;
use alphabet::DecodedString;
use hybrid::{HybridOutcome, HybridUnavailable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Hybrid,
    Static,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hybrid => f.write_str("hybrid"),
            Self::Static => f.write_str("static"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub strings: Vec<String>,
    pub strategy: Strategy,
    /// Why the hybrid stage did not produce the result, if it did not.
    pub hybrid_unavailable: Option<HybridUnavailable>,
}

/// Runs the hybrid stage, falling back to the static pipeline.
///
/// Holds no state between calls; one instance can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct Deobfuscator {
    options: Options,
}

impl Deobfuscator {
    pub const fn new(options: Options) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &Options {
        &self.options
    }

    pub fn extract(&self, source: &ScriptSource) -> Extraction {
        let text = source.as_str();

        match hybrid::decrypt(text, &self.options) {
            HybridOutcome::Decrypted(strings) => Extraction {
                strings,
                strategy: Strategy::Hybrid,
                hybrid_unavailable: None,
            },
            HybridOutcome::Unavailable(reason) => {
                let strings = self.extract_static(text);
                log::debug!("[DEOBF] static pipeline: {} strings", strings.len());
                Extraction {
                    strings,
                    strategy: Strategy::Static,
                    hybrid_unavailable: Some(reason),
                }
            }
        }
    }

    /// String table extraction, then shuffle reversal, then alphabet decoding.
    pub fn extract_static(&self, source: &str) -> Vec<String> {
        let Some(mut table) = string_table::extract(source, self.options.table_search_window) else {
            log::debug!("[DEOBF] no string table");
            return Vec::new();
        };

        let instructions = shuffle::find_instructions(source);
        table.apply_shuffles(&instructions);

        match alphabet::locate(
            source,
            self.options.alphabet_search_window,
            self.options.min_alphabet_entries,
        ) {
            Some(map) => map
                .decode_all(table.entries())
                .into_iter()
                .map(DecodedString::into_string)
                .collect(),
            None => table.into_entries(),
        }
    }
}
