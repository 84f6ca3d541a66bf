use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use lua_deob_rs::report::FileReport;
use lua_deob_rs::{Deobfuscator, Options, ScriptSource};

#[derive(Parser, Debug)]
#[command(version, about = "Recover the string table of obfuscated Lua scripts", long_about = None)]
struct Args {
    /// A .lua file, or a directory whose .lua files are processed
    path: PathBuf,

    /// List every recovered string, not only printable ones
    #[arg(long)]
    all: bool,

    /// Print one JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Skip the instrumented interpreter run
    #[arg(long)]
    no_hybrid: bool,

    /// Lua interpreter to use instead of searching for one
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// Interpreter timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// JSON file with pipeline options
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> lua_deob_rs::Result<()> {
    let options = build_options(args)?;
    let deobfuscator = Deobfuscator::new(options);

    let mut reports = Vec::new();
    for path in collect_inputs(&args.path)? {
        let source = ScriptSource::from_path(&path)?;
        let extraction = deobfuscator.extract(&source);
        let report = FileReport::new(path.display().to_string(), &extraction, args.all);

        if args.json {
            reports.push(report);
        } else {
            print!("{}", report.render_text());
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&reports)?;
        println!("{json}");
    }

    Ok(())
}

fn build_options(args: &Args) -> lua_deob_rs::Result<Options> {
    let mut options = match &args.config {
        Some(path) => Options::from_json_file(path)?,
        None => Options::default(),
    };

    if args.no_hybrid {
        options.hybrid = false;
    }
    if let Some(interpreter) = &args.interpreter {
        options.interpreter = Some(interpreter.clone());
    }
    if let Some(timeout) = args.timeout {
        options.hybrid_timeout_secs = timeout;
    }

    options.validate()?;
    Ok(options)
}

fn collect_inputs(path: &Path) -> lua_deob_rs::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(lua_deob_rs::DeobfuscateError::InvalidInput(format!(
            "{} is neither a file nor a directory",
            path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let candidate = entry?.path();
        if candidate.is_file() && candidate.extension().is_some_and(|ext| ext == "lua") {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}
