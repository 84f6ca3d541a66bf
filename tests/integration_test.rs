use std::time::Duration;

use lua_deob_rs::deobfuscate::hybrid::HybridUnavailable;
use lua_deob_rs::{Deobfuscator, Options, ScriptSource, Strategy, extract_strings};

fn no_interpreter() -> Options {
    Options {
        interpreter_candidates: Vec::new(),
        search_adjacent_interpreter: false,
        ..Options::default()
    }
}

#[test]
fn test_missing_interpreter_falls_back_to_static() {
    let source = ScriptSource::from_path("tests/fixtures/shuffled.lua").unwrap();
    let deob = Deobfuscator::new(no_interpreter());

    let extraction = deob.extract(&source);

    assert_eq!(extraction.strategy, Strategy::Static);
    assert_eq!(
        extraction.hybrid_unavailable,
        Some(HybridUnavailable::InterpreterNotFound)
    );
    assert_eq!(extraction.strings, deob.extract_static(source.as_str()));
}

#[test]
fn test_non_candidate_skips_hybrid() {
    let source = ScriptSource::from_path("tests/fixtures/plain.lua").unwrap();
    let extraction = Deobfuscator::default().extract(&source);

    assert_eq!(extraction.strategy, Strategy::Static);
    assert_eq!(
        extraction.hybrid_unavailable,
        Some(HybridUnavailable::NotApplicable)
    );
    assert_eq!(extraction.strings.len(), 8);
}

#[test]
fn test_extract_strings_reads_latin1() {
    let script = b"return(function(...) local S = {\"caf\xe9\", \"\\233t\xe9\"} end)(...)";
    assert_eq!(extract_strings(script), vec!["café", "été"]);
}

#[test]
fn test_extract_strings_empty_input() {
    assert!(extract_strings(b"").is_empty());
    assert!(extract_strings(b"local x = {1, 2, 3}").is_empty());
}

#[test]
fn test_options_from_json() {
    let options = Options::from_json(r#"{"hybrid": false, "min_alphabet_entries": 10}"#).unwrap();
    assert!(!options.hybrid);
    assert_eq!(options.min_alphabet_entries, 10);
    assert_eq!(options.table_search_window, Options::default().table_search_window);
}

#[cfg(unix)]
mod fake_interpreter {
    use super::*;

    fn options_with_script(dir: &std::path::Path, body: &str) -> Options {
        let fake = dir.join("fake-lua.sh");
        std::fs::write(&fake, body).unwrap();
        Options {
            interpreter: Some("/bin/sh".into()),
            interpreter_args: vec![fake.display().to_string()],
            temp_dir: Some(dir.to_path_buf()),
            ..Options::default()
        }
    }

    #[test]
    fn test_hybrid_reads_tagged_output() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_with_script(
            dir.path(),
            "grep -F -q 'os.exit(0) return(function(T, n)' \"$1\" || exit 3\n\
             echo 'loading...'\n\
             echo 'DEC_STR: Players'\n\
             echo 'DEC_STR: Hello, World!'\n",
        );
        let source = ScriptSource::from_path("tests/fixtures/shuffled.lua").unwrap();

        let extraction = Deobfuscator::new(options).extract(&source);

        assert_eq!(extraction.strategy, Strategy::Hybrid);
        assert_eq!(extraction.hybrid_unavailable, None);
        assert_eq!(extraction.strings, ["Players", "Hello, World!"]);
    }

    #[test]
    fn test_hybrid_failure_exit_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_with_script(dir.path(), "echo 'DEC_STR: partial'\nexit 1\n");
        let source = ScriptSource::from_path("tests/fixtures/shuffled.lua").unwrap();

        let extraction = Deobfuscator::new(options).extract(&source);

        assert_eq!(extraction.strategy, Strategy::Static);
        assert_eq!(
            extraction.hybrid_unavailable,
            Some(HybridUnavailable::ExitStatus(Some(1)))
        );
        assert_eq!(extraction.strings, ["a", "b", "c", "d", "e", "f", "g"]);
    }

    #[test]
    fn test_hybrid_timeout_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options_with_script(dir.path(), "exec sleep 5\n");
        options.hybrid_timeout_secs = 1;
        let source = ScriptSource::from_path("tests/fixtures/shuffled.lua").unwrap();

        let extraction = Deobfuscator::new(options).extract(&source);

        assert_eq!(extraction.strategy, Strategy::Static);
        assert_eq!(
            extraction.hybrid_unavailable,
            Some(HybridUnavailable::Timeout(Duration::from_secs(1)))
        );
        assert_eq!(extraction.strings.len(), 7);
    }

    #[test]
    fn test_detached_descendant_cannot_stall_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options_with_script(
            dir.path(),
            "echo 'DEC_STR: x'\nsleep 5 &\nexit 0\n",
        );
        options.hybrid_timeout_secs = 1;
        let source = ScriptSource::from_path("tests/fixtures/shuffled.lua").unwrap();

        let started = std::time::Instant::now();
        let extraction = Deobfuscator::new(options).extract(&source);

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(extraction.strategy, Strategy::Static);
        assert_eq!(
            extraction.hybrid_unavailable,
            Some(HybridUnavailable::Timeout(Duration::from_secs(1)))
        );
        assert_eq!(extraction.strings, ["a", "b", "c", "d", "e", "f", "g"]);
    }
}
