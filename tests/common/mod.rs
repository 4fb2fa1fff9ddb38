//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a scratch
//! BSP tree and a scripted command runner standing in for the build tools.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use bspcheck::error::RunError;
use bspcheck::infra::process::{CommandOutput, CommandRunner, Invocation};
use tempfile::TempDir;

/// Minimal `.config` of a target
pub const BASE_KCONFIG: &str = "\
CONFIG_RT_USING_SERIAL=y
# CONFIG_RT_USING_I2C is not set
CONFIG_RT_NAME_MAX=8
";

/// Test workspace holding a BSP directory
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Directory holding the targets
    pub fn bsp_dir(&self) -> PathBuf {
        self.dir.path().join("bsp")
    }

    /// Directory for logs and reports
    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("build_logs")
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a target with a build description, sources and `.config`
    pub fn create_target(&self, name: &str, kconfig: &str) -> PathBuf {
        let root = format!("bsp/{name}");
        self.create_file(&format!("{root}/SConstruct"), "# build description\n");
        self.create_file(&format!("{root}/applications/main.c"), "int main(void) { return 0; }\n");
        self.create_file(&format!("{root}/rtconfig.h"), "#define RT_NAME_MAX 8\n");
        self.create_file(&format!("{root}/.config"), kconfig);
        self.bsp_dir().join(name)
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline step an invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clean,
    Configure,
    PackageUpdate,
    Compile,
    Other,
}

impl Step {
    fn of(invocation: &Invocation) -> Self {
        if invocation.program == "pkgs" {
            return Self::PackageUpdate;
        }
        match invocation.args.first().map(String::as_str) {
            Some("-c") => Self::Clean,
            Some("--pyconfig-silent") => Self::Configure,
            Some(arg) if arg.starts_with("-j") => Self::Compile,
            _ => Self::Other,
        }
    }
}

/// What the fake tool does
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this output
    Output(CommandOutput),
    /// Fail with this error
    Error(RunError),
    /// Exit 0 without producing anything
    Nothing,
    /// Create `packages/<dir>/<file>` entries, then exit 0
    Packages(Vec<(String, String)>),
    /// Delete this file in the target directory, then compile normally
    Delete(String),
    /// Never finish
    Hang,
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    /// Target directory name
    pub target: String,
    pub step: Step,
    pub command_line: String,
    /// `.config` contents when the command ran
    pub kconfig: Option<String>,
}

/// Command runner replaying scripted replies
///
/// Unscripted compiles write `rtthread.bin` and succeed; every other
/// unscripted command succeeds with no output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Step, Reply)>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply of `step` for `target`
    #[must_use]
    pub fn on(mut self, target: &str, step: Step, reply: Reply) -> Self {
        self.rules.push((target.to_string(), step, reply));
        self
    }

    /// Every recorded call
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Steps run for one target, in order
    pub fn steps_for(&self, target: &str) -> Vec<Step> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.target == target)
            .map(|c| c.step)
            .collect()
    }
}

fn target_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let target = target_name(&invocation.cwd);
        let step = Step::of(invocation);
        self.calls.borrow_mut().push(Call {
            target: target.clone(),
            step,
            command_line: invocation.command_line(),
            kconfig: std::fs::read_to_string(invocation.cwd.join(".config")).ok(),
        });

        let scripted = self
            .rules
            .iter()
            .find(|(t, s, _)| *t == target && *s == step)
            .map(|(_, _, reply)| reply.clone());

        match scripted {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Nothing) => Ok(CommandOutput::ok("")),
            Some(Reply::Packages(entries)) => {
                for (dir, file) in entries {
                    let path = invocation.cwd.join("packages").join(dir);
                    std::fs::create_dir_all(&path).expect("Failed to create package");
                    std::fs::write(path.join(file), "/* source */\n").expect("Failed to write package");
                }
                Ok(CommandOutput::ok("Package update finished\n"))
            }
            Some(Reply::Delete(file)) => {
                std::fs::remove_file(invocation.cwd.join(file)).expect("Failed to delete file");
                Ok(compile(&invocation.cwd))
            }
            Some(Reply::Hang) => std::future::pending().await,
            None if step == Step::Compile => Ok(compile(&invocation.cwd)),
            None => Ok(CommandOutput::ok("")),
        }
    }
}

/// Write `rtthread.bin` the way a successful compile does
fn compile(target_dir: &Path) -> CommandOutput {
    std::fs::write(target_dir.join("rtthread.bin"), [0u8; 128]).expect("Failed to write artifact");
    CommandOutput::ok("Linking rtthread.elf\n")
}

/// Timeout error as the system runner reports it
pub fn timeout(program: &str, seconds: u64) -> RunError {
    RunError::Timeout {
        program: program.to_string(),
        seconds,
    }
}
