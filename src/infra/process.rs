//! External process invocation
//!
//! Every external tool (build driver, package manager, compiler probes) is
//! started through [`CommandRunner`]. The system implementation enforces the
//! per-invocation timeout and kills the child when the timeout elapses or the
//! awaiting future is dropped.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::RunError;

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Time budget
    pub timeout: Duration,
}

impl Invocation {
    /// Create an invocation with no arguments and a 60 second budget
    pub fn new(program: &str, cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the timeout in seconds
    #[must_use]
    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    /// Human-readable command line
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Create a successful output with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Create an output with an explicit exit code
    pub fn with_code(code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    /// Whether the process exited with status zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, formatted for a build log
    pub fn transcript(&self) -> String {
        let mut text = if self.stdout.is_empty() {
            "(no output)\n".to_string()
        } else {
            self.stdout.clone()
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if !self.stderr.is_empty() {
            text.push_str("=== Stderr ===\n");
            text.push_str(&self.stderr);
            if !self.stderr.ends_with('\n') {
                text.push('\n');
            }
        }
        text
    }

    /// First non-empty line of stdout or stderr
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

/// Runs external commands
pub trait CommandRunner {
    /// Run the invocation to completion or until its timeout elapses
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<CommandOutput, RunError>>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        tracing::debug!(
            "Running `{}` in {} (timeout {}s)",
            invocation.command_line(),
            invocation.cwd.display(),
            invocation.timeout.as_secs()
        );

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunError::NotFound {
                        program: invocation.program.clone(),
                    }
                } else {
                    RunError::Spawn {
                        program: invocation.program.clone(),
                        error: e.to_string(),
                    }
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(invocation.timeout, child.wait_with_output())
            .await
            .map_err(|_| RunError::Timeout {
                program: invocation.program.clone(),
                seconds: invocation.timeout.as_secs(),
            })?
            .map_err(|e| RunError::Io {
                program: invocation.program.clone(),
                error: e.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
