use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DeobfuscateError, Result};

/// Tuning knobs for the pipeline.
///
/// The window sizes and the alphabet threshold are detection heuristics tuned
/// against real obfuscator output. They are best-effort signatures, not parse
/// guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Characters after the wrapper closure searched for the string table declaration.
    pub table_search_window: usize,
    /// Characters after the decoding anchor searched for the alphabet table.
    pub alphabet_search_window: usize,
    /// An alphabet table must have strictly more entries than this.
    pub min_alphabet_entries: usize,
    pub hybrid: bool,
    pub hybrid_timeout_secs: u64,
    /// Interpreter to use instead of discovery.
    pub interpreter: Option<PathBuf>,
    /// Arguments passed to the interpreter before the script path.
    pub interpreter_args: Vec<String>,
    pub interpreter_candidates: Vec<String>,
    pub search_adjacent_interpreter: bool,
    /// Directory for the instrumented copy. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
    pub marker_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            table_search_window: 2000,
            alphabet_search_window: 8000,
            min_alphabet_entries: 50,
            hybrid: true,
            hybrid_timeout_secs: 10,
            interpreter: None,
            interpreter_args: Vec::new(),
            interpreter_candidates: vec![
                "lua5.1".to_string(),
                "lua".to_string(),
                "luajit".to_string(),
            ],
            search_adjacent_interpreter: true,
            temp_dir: None,
            marker_prefix: "DEC_STR: ".to_string(),
        }
    }
}

impl Options {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(text).map_err(|e| DeobfuscateError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker_prefix.is_empty() {
            return Err(DeobfuscateError::Config(
                "marker_prefix must not be empty".to_string(),
            ));
        }
        if self.marker_prefix.contains('\n') {
            return Err(DeobfuscateError::Config(
                "marker_prefix must fit on one line".to_string(),
            ));
        }
        if self.hybrid_timeout_secs == 0 {
            return Err(DeobfuscateError::Config(
                "hybrid_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn hybrid_timeout(&self) -> Duration {
        Duration::from_secs(self.hybrid_timeout_secs)
    }
}
