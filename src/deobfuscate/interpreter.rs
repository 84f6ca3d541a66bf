use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::hybrid::HybridUnavailable;
use crate::options::Options;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A Lua interpreter binary plus any arguments placed before the script path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    path: PathBuf,
    args: Vec<String>,
}

impl Interpreter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks for an interpreter: the configured one, then `lua` next to the
    /// running executable, then each candidate name on `PATH`.
    pub fn discover(options: &Options) -> Option<Self> {
        let found = if let Some(configured) = &options.interpreter {
            which::which(configured).ok()
        } else {
            options
                .search_adjacent_interpreter
                .then(adjacent)
                .flatten()
                .or_else(|| {
                    options
                        .interpreter_candidates
                        .iter()
                        .find_map(|name| which::which(name).ok())
                })
        };

        match found {
            Some(path) => {
                log::debug!("[HYBRID] interpreter {}", path.display());
                Some(Self::new(path).with_args(options.interpreter_args.clone()))
            }
            None => {
                log::debug!("[HYBRID] no interpreter found");
                None
            }
        }
    }

    /// Runs `script`, returning its stdout.
    ///
    /// Both the process and the draining of its stdout share one deadline. A
    /// descendant that keeps stdout open past it counts as a timeout, and the
    /// output is discarded. A non-zero exit status is a failure.
    pub fn run(&self, script: &Path, timeout: Duration) -> Result<Vec<u8>, HybridUnavailable> {
        let mut child = Command::new(&self.path)
            .args(&self.args)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HybridUnavailable::Process(format!("spawn {}: {e}", self.path.display())))?;

        let Some(mut stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(HybridUnavailable::Process("stdout not captured".to_string()));
        };
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    reap(&mut child);
                    return Err(self.timed_out(timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    reap(&mut child);
                    return Err(HybridUnavailable::Process(e.to_string()));
                }
            }
        };

        if !status.success() {
            return Err(HybridUnavailable::ExitStatus(status.code()));
        }

        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(output) => output.map_err(|e| HybridUnavailable::Process(e.to_string())),
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(HybridUnavailable::Process("stdout reader panicked".to_string()))
            }
        }
    }

    fn timed_out(&self, timeout: Duration) -> HybridUnavailable {
        log::warn!(
            "[HYBRID] {} timed out after {:?}",
            self.path.display(),
            timeout
        );
        HybridUnavailable::Timeout(timeout)
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn adjacent() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?;
    which::which_in("lua", Some(dir), dir).ok()
}
