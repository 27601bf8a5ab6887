use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::MapsError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// What to execute: an argument vector, or a line handed to `/bin/sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Argv(Vec<String>),
    Shell(String),
}

impl CommandLine {
    pub fn argv<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(items.into_iter().map(Into::into).collect())
    }

    pub fn shell(line: impl Into<String>) -> Self {
        CommandLine::Shell(line.into())
    }

    /// Single shell line, quoting argv items where needed.
    pub fn to_shell(&self) -> String {
        match self {
            CommandLine::Argv(items) => items
                .iter()
                .map(|item| shell_quote(item))
                .collect::<Vec<_>>()
                .join(" "),
            CommandLine::Shell(line) => line.clone(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        match self {
            CommandLine::Argv(items) => items.first().map(String::as_str),
            CommandLine::Shell(_) => Some("/bin/sh"),
        }
    }

    fn to_command(&self) -> Result<Command, MapsError> {
        match self {
            CommandLine::Argv(items) => {
                let (program, args) = items.split_first().ok_or_else(|| {
                    MapsError::InvalidArgument("empty command line".to_string())
                })?;
                let mut command = Command::new(program);
                command.args(args);
                Ok(command)
            }
            CommandLine::Shell(line) => {
                let mut command = Command::new("/bin/sh");
                command.arg("-c").arg(line);
                Ok(command)
            }
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: CommandLine,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub tty: bool,
    pub quiet: bool,
    pub allow_failure: bool,
}

impl ProcessSpec {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            working_dir: None,
            env: BTreeMap::new(),
            timeout: Some(Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS)),
            tty: false,
            quiet: false,
            allow_failure: false,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn allow_failure(mut self, allow_failure: bool) -> Self {
        self.allow_failure = allow_failure;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    /// Output to attach to an error: stderr, falling back to stdout.
    pub fn output(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError> {
        (**self).run(spec)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    stdout_to_stderr: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo tool stdout on stderr, leaving stdout to machine output.
    pub fn stdout_to_stderr(mut self, enabled: bool) -> Self {
        self.stdout_to_stderr = enabled;
        self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError> {
        let label = spec.command.to_string();
        let mut command = spec.command.to_command()?;
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        command.envs(&spec.env);
        if spec.tty {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        debug!(command = %label, cwd = ?spec.working_dir, timeout = ?spec.timeout, "spawning process");
        let mut child = command.spawn().map_err(|err| MapsError::ProcessExecution {
            command: label.clone(),
            code: None,
            output: err.to_string(),
        })?;

        let stdout_echo = if self.stdout_to_stderr {
            Stream::Stderr
        } else {
            Stream::Stdout
        };
        let stdout = Capture::start(child.stdout.take(), !spec.quiet, stdout_echo);
        let stderr = Capture::start(child.stderr.take(), !spec.quiet, Stream::Stderr);

        let Some(status) = wait_with_timeout(&mut child, spec.timeout, &label)? else {
            let timeout = spec.timeout.unwrap_or_default();
            warn!(command = %label, ?timeout, "process timed out and was killed");
            let mut output = stderr.snapshot();
            if output.trim().is_empty() {
                output = stdout.snapshot();
            }
            return Err(MapsError::ProcessExecution {
                command: label,
                code: None,
                output: format!(
                    "timed out after {}s {}",
                    timeout.as_secs_f64(),
                    output.trim()
                )
                .trim()
                .to_string(),
            });
        };

        let outcome = ProcessOutcome {
            code: status.code(),
            success: status.success(),
            stdout: stdout.finish(),
            stderr: stderr.finish(),
        };
        debug!(command = %label, code = ?outcome.code, "process exited");

        if !outcome.success && !spec.allow_failure {
            return Err(MapsError::ProcessExecution {
                command: label,
                code: outcome.code,
                output: outcome.output(),
            });
        }
        Ok(outcome)
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
    label: &str,
) -> Result<Option<ExitStatus>, MapsError> {
    let to_error = |err: io::Error| MapsError::ProcessExecution {
        command: label.to_string(),
        code: None,
        output: err.to_string(),
    };
    let Some(timeout) = timeout else {
        return child.wait().map(Some).map_err(to_error);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(to_error)? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // The child may already be gone; only the wait result matters.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Drains a child pipe on its own thread, optionally echoing it.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Capture {
    fn start<P: Read + Send + 'static>(pipe: Option<P>, echo: bool, stream: Stream) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    let read = match pipe.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(read) => read,
                    };
                    if echo {
                        let _ = match stream {
                            Stream::Stdout => io::stdout().write_all(&chunk[..read]),
                            Stream::Stderr => io::stderr().write_all(&chunk[..read]),
                        };
                    }
                    if let Ok(mut guard) = buffer.lock() {
                        guard.extend_from_slice(&chunk[..read]);
                    }
                }
            })
        });
        Self { buffer, handle }
    }

    fn snapshot(&self) -> String {
        self.buffer
            .lock()
            .map(|guard| String::from_utf8_lossy(&guard).into_owned())
            .unwrap_or_default()
    }

    fn finish(mut self) -> String {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.snapshot()
    }
}

pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | ',' | '=' | '@' | '+')
        });
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}
