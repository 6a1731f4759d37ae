//! External process execution.
//!
//! Two modes, both producing a [`ProcessResult`]:
//! - buffered: run to completion and capture stdout/stderr (structured CLI output)
//! - streamed: forward stdout live, accumulate stderr (builds, pushes, deploys)

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use serde::Serialize;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::shell;

const REDACTED: &str = "****";

/// How a streamed command's stderr is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrPolicy {
    /// Any stderr output fails the command, whatever the exit code.
    #[default]
    Strict,
    /// Only the exit status decides.
    ExitStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stderr_policy: StderrPolicy,
    redacted: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Run a complete command line through the platform shell.
    pub fn shell(script: impl Into<String>) -> Self {
        #[cfg(windows)]
        {
            Self::new("cmd").arg("/C").arg(script)
        }

        #[cfg(not(windows))]
        {
            Self::new("sh").arg("-c").arg(script)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append the argument only when a value is present.
    pub fn opt_arg(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    pub fn stderr_policy(mut self, policy: StderrPolicy) -> Self {
        self.stderr_policy = policy;
        self
    }

    /// Mask a secret value wherever it appears in [`CommandSpec::display`].
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.redacted.push(secret);
        }
        self
    }

    /// Printable command line with secrets masked.
    ///
    /// Masking happens on the raw arguments, before quoting, so a secret is
    /// hidden even when quoting would rewrite it.
    pub fn display(&self) -> String {
        let is_shell = matches!(self.program.as_str(), "sh" | "cmd")
            && matches!(self.args.first().map(String::as_str), Some("-c") | Some("/C"));

        if is_shell {
            return self.mask(&self.args[1..].join(" "));
        }

        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|arg| self.mask(arg)));
        shell::quote_args(&parts)
    }

    fn mask(&self, text: &str) -> String {
        self.redacted
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Seam between pipeline steps and the operating system.
pub trait ProcessRunner {
    fn buffered(&self, spec: &CommandSpec) -> Result<ProcessResult>;
    fn streamed(&self, spec: &CommandSpec) -> Result<ProcessResult>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn buffered(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        run_buffered(spec)
    }

    fn streamed(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        run_streamed(spec)
    }
}

/// Run to completion and capture all output.
///
/// A non-zero exit (or death by signal) is a `process.command_failed` error
/// carrying the captured stdout/stderr. Stderr on a successful exit is
/// returned to the caller untouched.
pub fn run_buffered(spec: &CommandSpec) -> Result<ProcessResult> {
    let output = spec
        .to_command()
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::process_spawn_failed(spec.display(), e.to_string()))?;

    let result = ProcessResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        signal: exit_signal(&output.status),
    };

    check_buffered(spec, result)
}

/// Run while forwarding stdout to our stdout as it arrives.
///
/// Stderr lines are echoed with a `stderr: ` prefix and accumulated; the
/// result never carries stdout.
pub fn run_streamed(spec: &CommandSpec) -> Result<ProcessResult> {
    let mut child = spec
        .to_command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::process_spawn_failed(spec.display(), e.to_string()))?;

    let stderr_pipe = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut collected = String::new();
        if let Some(pipe) = stderr_pipe {
            for line in BufReader::new(pipe).lines().map_while(std::result::Result::ok) {
                eprintln!("stderr: {}", line);
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    });

    if let Some(pipe) = child.stdout.take() {
        forward(pipe, &mut io::stdout());
    }

    let status = child
        .wait()
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("wait for {}", spec.program))))?;

    let stderr = stderr_reader
        .join()
        .map_err(|_| Error::internal_unexpected("stderr reader thread panicked"))?;

    let result = ProcessResult {
        stdout: String::new(),
        stderr,
        exit_code: status.code(),
        signal: exit_signal(&status),
    };

    check_streamed(spec, result)
}

fn forward<R: Read, W: Write>(mut source: R, sink: &mut W) {
    let mut buf = [0u8; 8192];
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                // A closed terminal must not kill the child mid-build; keep draining.
                let _ = sink.write_all(&buf[..n]);
                let _ = sink.flush();
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

pub(crate) fn check_buffered(spec: &CommandSpec, result: ProcessResult) -> Result<ProcessResult> {
    if result.success() {
        return Ok(result);
    }
    Err(command_failed(spec, result))
}

pub(crate) fn check_streamed(spec: &CommandSpec, result: ProcessResult) -> Result<ProcessResult> {
    let stderr_failed =
        spec.stderr_policy == StderrPolicy::Strict && !result.stderr.trim().is_empty();

    if result.success() && !stderr_failed {
        return Ok(result);
    }
    Err(command_failed(spec, result))
}

fn command_failed(spec: &CommandSpec, result: ProcessResult) -> Error {
    Error::process_command_failed(CommandFailedDetails {
        command: spec.display(),
        exit_code: result.exit_code,
        signal: result.signal,
        stdout: result.stdout.trim().to_string(),
        stderr: result.stderr.trim().to_string(),
    })
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
