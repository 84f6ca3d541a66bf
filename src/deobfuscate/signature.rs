use lazy_static::lazy_static;
use regex::Regex;

use crate::source::advance_chars;

lazy_static! {
    static ref HEADER_WRAPPER: Regex = Regex::new(
        r"\A\s*--\[\[(?:[^\]]|\][^\]])*\]\]\s*return\s*\(\s*function\s*\(\s*\.\.\.\s*\)\s*local\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*\{"
    )
    .expect("header wrapper pattern");
    static ref WRAPPER: Regex =
        Regex::new(r"return\s*\(\s*function\s*\(\s*\.\.\.\s*\)").expect("wrapper pattern");
    static ref LOCAL_TABLE: Regex =
        Regex::new(r"local\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*\{").expect("local table pattern");
}

/// Location of the obfuscator's `return(function(...) local V = { ... }` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperSignature {
    pub table_var: String,
    pub closure_start: usize,
    /// Byte offset of the string table's opening `{`.
    pub table_open: usize,
    pub has_header: bool,
}

/// Finds the wrapper closure and its string table declaration.
///
/// A leading `--[[ ... ]]` header with the table declared right after the
/// closure is tried first. Otherwise the first wrapper closure anywhere is
/// used, with the table declaration searched within `window` characters.
pub fn locate(source: &str, window: usize) -> Option<WrapperSignature> {
    if let Some(caps) = HEADER_WRAPPER.captures(source) {
        let whole = caps.get(0)?;
        let name = caps.get(1)?;
        let closure_start = WRAPPER
            .find(whole.as_str())
            .map_or(whole.start(), |m| whole.start() + m.start());
        log::debug!("[SIGNATURE] header wrapper, table `{}`", name.as_str());
        return Some(WrapperSignature {
            table_var: name.as_str().to_string(),
            closure_start,
            table_open: whole.end() - 1,
            has_header: true,
        });
    }

    let closure = WRAPPER.find(source)?;
    let area_end = advance_chars(source, closure.end(), window);
    let area = &source[closure.end()..area_end];

    let Some(caps) = LOCAL_TABLE.captures(area) else {
        log::debug!("[SIGNATURE] wrapper at {} has no table within window", closure.start());
        return None;
    };
    let whole = caps.get(0)?;
    let name = caps.get(1)?;

    log::debug!("[SIGNATURE] wrapper at {}, table `{}`", closure.start(), name.as_str());
    Some(WrapperSignature {
        table_var: name.as_str().to_string(),
        closure_start: closure.start(),
        table_open: closure.end() + whole.end() - 1,
        has_header: false,
    })
}
