use super::shuffle::ShuffleInstruction;
use super::signature::{self, WrapperSignature};
use crate::lexer::{Lexer, TableToken};

/// The wrapper's flat table of string literals, in source order.
///
/// Entries can be reordered but never added or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    variable: String,
    entries: Vec<String>,
}

impl StringTable {
    pub fn new(variable: impl Into<String>, entries: Vec<String>) -> Self {
        Self {
            variable: variable.into(),
            entries,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a 1-based index, as the script itself addresses it.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index.checked_sub(1)?).map(String::as_str)
    }

    pub fn apply_shuffles(&mut self, instructions: &[ShuffleInstruction]) {
        for instruction in instructions {
            instruction.apply(&mut self.entries);
        }
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

/// Locates the wrapper closure and reads its string table.
///
/// Returns `None` when there is no wrapper or no table near it.
pub fn extract(source: &str, window: usize) -> Option<StringTable> {
    let signature = signature::locate(source, window)?;
    Some(read_table(source, &signature))
}

pub fn read_table(source: &str, signature: &WrapperSignature) -> StringTable {
    let mut lexer = Lexer::at(source, signature.table_open);
    let mut entries = Vec::new();

    if lexer.enter_table() {
        while let Some(TableToken::Literal(value)) = lexer.next_table_token() {
            entries.push(value);
        }
    }

    log::debug!(
        "[TABLE] `{}`: {} literals",
        signature.table_var,
        entries.len()
    );
    StringTable::new(signature.table_var.clone(), entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_table() {
        let src = r#"return(function(...) local S = {"a","b","c"} local x = S[1] end)(...)"#;
        let table = extract(src, 2000).unwrap();
        assert_eq!(table.variable(), "S");
        assert_eq!(table.entries(), ["a", "b", "c"]);
        assert_eq!(table.get(1), Some("a"));
        assert_eq!(table.get(3), Some("c"));
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(4), None);
    }

    #[test]
    fn test_extract_decodes_escapes() {
        let src = r#"return(function(...) local T = {"\72\101\108\108\111", 'a\nb', "q\"q"} end)(...)"#;
        let table = extract(src, 2000).unwrap();
        assert_eq!(table.entries(), ["Hello", "a\nb", "q\"q"]);
    }

    #[test]
    fn test_extract_skips_non_literals() {
        let src = r#"return(function(...) local T = {"a"; 12, true, "b",} end)(...)"#;
        let table = extract(src, 2000).unwrap();
        assert_eq!(table.entries(), ["a", "b"]);
    }

    #[test]
    fn test_extract_without_wrapper() {
        assert!(extract(r#"local S = {"a"}"#, 2000).is_none());
    }

    #[test]
    fn test_nested_table_ends_scan() {
        let src = r#"return(function(...) local S = {"a", {"b"}, "c"} end)(...)"#;
        let table = extract(src, 2000).unwrap();
        assert_eq!(table.entries(), ["a", "b"]);
    }

    #[test]
    fn test_empty_table() {
        let table = extract("return(function(...) local S = {} end)(...)", 2000).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_shuffles_keep_length() {
        let mut table = StringTable::new(
            "S",
            ["1", "2", "3", "4"].iter().map(ToString::to_string).collect(),
        );
        table.apply_shuffles(&[ShuffleInstruction::new(1, 4), ShuffleInstruction::new(2, 9)]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.entries(), ["4", "3", "2", "1"]);
    }
}
