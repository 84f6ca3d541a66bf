//! # lua-deob-rs
//!
//! Recovers the literal strings hidden in obfuscated Lua scripts.
//!
//! Two strategies are tried in order: a hybrid run that instruments a copy of the
//! script and executes it under a Lua interpreter, then a static pipeline that
//! extracts the wrapper's string table, undoes index shuffles and decodes
//! custom-alphabet base64 entries.
//!
//! ## Example
//!
//! ```rust
//! use lua_deob_rs::extract_strings;
//!
//! let script = br#"return(function(...) local S = {"a","b","c"} end)(...)"#;
//! assert_eq!(extract_strings(script), vec!["a", "b", "c"]);
//! ```

pub mod deobfuscate;
pub mod lexer;
pub mod options;
pub mod report;
pub mod source;

pub use deobfuscate::{Deobfuscator, Extraction, Strategy};
pub use options::Options;
pub use source::ScriptSource;

#[derive(Debug, thiserror::Error)]
pub enum DeobfuscateError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeobfuscateError>;

/// Recovers candidate strings from raw script bytes using default [`Options`].
///
/// Never fails: a script nothing can be recovered from yields an empty list.
pub fn extract_strings(raw: &[u8]) -> Vec<String> {
    let source = ScriptSource::from_bytes(raw);
    Deobfuscator::new(Options::default()).extract(&source).strings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extract() {
        let script = br#"return(function(...) local S = {"a","b","c"} end)(...)"#;
        assert_eq!(extract_strings(script), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unrelated_script_is_empty() {
        assert!(extract_strings(b"print('hello')").is_empty());
    }
}
