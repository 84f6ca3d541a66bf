//! Runtime string recovery.
//!
//! Scripts that decrypt their string table at load time are easier to run than
//! to model. A copy of the script gets a dump loop inserted right before the
//! inner closure that receives the table, and the copy runs under a real Lua
//! interpreter. Every way this can go wrong is reported as
//! [`HybridUnavailable`] so the caller can fall back to static analysis.

use std::io::Write;
use std::time::Duration;

use tempfile::{Builder, TempPath};

use super::interpreter::Interpreter;
use super::signature;
use crate::options::Options;
use crate::source::{ScriptSource, encode_latin1};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HybridUnavailable {
    #[error("hybrid decryption disabled")]
    Disabled,

    #[error("no wrapper closure with pairwise iteration")]
    NotApplicable,

    #[error("string table variable not found")]
    NoTableVariable,

    #[error("no closure invocation taking `{0}`")]
    NoInjectionPoint(String),

    #[error("no lua interpreter found")]
    InterpreterNotFound,

    #[error("temporary script: {0}")]
    TempFile(String),

    #[error("interpreter process: {0}")]
    Process(String),

    #[error("interpreter timed out after {0:?}")]
    Timeout(Duration),

    #[error("interpreter exited with status {0:?}")]
    ExitStatus(Option<i32>),

    #[error("interpreter printed no tagged strings")]
    NoTaggedOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HybridOutcome {
    Decrypted(Vec<String>),
    Unavailable(HybridUnavailable),
}

/// Cheap textual check for the wrapper and `ipairs` idioms.
pub fn is_candidate(source: &str) -> bool {
    source.contains("return(function") && source.contains("ipairs")
}

/// Lua that prints every string in `table_var` behind `marker`, then exits.
pub fn instrumentation(table_var: &str, marker: &str) -> String {
    let marker = marker.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        " for i,v in ipairs({table_var}) do if type(v)==\"string\" then print(\"{marker}\"..v) end end os.exit(0) "
    )
}

/// Inserts the dump loop before the first `return(function(V,` (or, failing
/// that, `return(function(V`). The outer `return(function(...)` never matches
/// because it takes `...`, not the table.
pub fn instrument(source: &str, table_var: &str, marker: &str) -> Option<String> {
    let with_args = format!("return(function({table_var},");
    let bare = format!("return(function({table_var}");
    let at = source
        .find(&with_args)
        .or_else(|| source.find(&bare))?;

    let snippet = instrumentation(table_var, marker);
    let mut out = String::with_capacity(source.len() + snippet.len());
    out.push_str(&source[..at]);
    out.push_str(&snippet);
    out.push_str(&source[at..]);
    Some(out)
}

/// Lines of `stdout` that start with `marker`, marker removed.
pub fn parse_tagged_output(stdout: &str, marker: &str) -> Vec<String> {
    stdout
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter_map(|line| line.strip_prefix(marker))
        .map(str::to_string)
        .collect()
}

pub fn decrypt(source: &str, options: &Options) -> HybridOutcome {
    match try_decrypt(source, options) {
        Ok(strings) => {
            log::debug!("[HYBRID] recovered {} strings", strings.len());
            HybridOutcome::Decrypted(strings)
        }
        Err(reason) => {
            log::debug!("[HYBRID] unavailable: {reason}");
            HybridOutcome::Unavailable(reason)
        }
    }
}

fn try_decrypt(source: &str, options: &Options) -> Result<Vec<String>, HybridUnavailable> {
    if !options.hybrid {
        return Err(HybridUnavailable::Disabled);
    }
    if !is_candidate(source) {
        return Err(HybridUnavailable::NotApplicable);
    }

    let signature = signature::locate(source, options.table_search_window)
        .ok_or(HybridUnavailable::NoTableVariable)?;
    let instrumented = instrument(source, &signature.table_var, &options.marker_prefix)
        .ok_or_else(|| HybridUnavailable::NoInjectionPoint(signature.table_var.clone()))?;
    let interpreter = Interpreter::discover(options).ok_or(HybridUnavailable::InterpreterNotFound)?;

    let script = write_script(&instrumented, options)?;
    log::debug!("[HYBRID] running {}", script.display());
    let result = interpreter.run(&script, options.hybrid_timeout());

    let shown = script.display().to_string();
    if let Err(e) = script.close() {
        log::warn!("[HYBRID] could not remove {shown}: {e}");
    }

    let stdout = ScriptSource::from_bytes(&result?);
    let strings = parse_tagged_output(stdout.as_str(), &options.marker_prefix);
    if strings.is_empty() {
        return Err(HybridUnavailable::NoTaggedOutput);
    }
    Ok(strings)
}

/// Writes the instrumented copy to a fresh uniquely named file. The file is
/// deleted when the returned path is dropped or closed.
fn write_script(script: &str, options: &Options) -> Result<TempPath, HybridUnavailable> {
    let mut builder = Builder::new();
    builder.prefix("luadeob-").suffix(".lua");

    let mut file = match &options.temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| HybridUnavailable::TempFile(e.to_string()))?;

    file.write_all(&encode_latin1(script))
        .and_then(|()| file.flush())
        .map_err(|e| HybridUnavailable::TempFile(e.to_string()))?;

    Ok(file.into_temp_path())
}
