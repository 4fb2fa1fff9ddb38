//! Per-target build state machine
//!
//! ```text
//! Init -> Clean? -> Configure -> PatchAndReconfigure? -> PackageCheck
//!      -> PackageUpdate? -> Compile -> Verify -> Restore -> Success | Failed
//! ```
//!
//! Every step returns the next state or a [`BuildFailure`]. A failure jumps
//! straight to `Restore`, so the configuration backup is always released
//! through an explicit restore. Success is decided by the firmware artifact,
//! never by the compiler's exit code.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::config::defaults::{
    ARTIFACT_STEM, KCONFIG_FILE, PACKAGES_DIR, SIZED_ARTIFACT_EXTENSIONS,
    SUCCESS_ARTIFACT_EXTENSIONS,
};
use crate::core::clean;
use crate::core::packages::{self, PackageInventory};
use crate::core::patcher::{self, ConfigBackup};
use crate::core::settings::BuildConfig;
use crate::core::target::{Target, TargetStatus};
use crate::error::{BuildFailure, PackageResolutionError, RunError};
use crate::infra::filesystem;
use crate::infra::process::{CommandOutput, CommandRunner, Invocation};

/// States of one target attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildState {
    Init,
    Clean,
    Configure,
    PatchAndReconfigure,
    PackageCheck,
    PackageUpdate,
    Compile,
    Verify,
    Restore,
    Success,
    Failed,
}

/// Outcome of one target
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// Target name
    pub target: String,
    /// Terminal status
    pub status: TargetStatus,
    /// Whether firmware was produced and the configuration restored
    pub success: bool,
    /// Full log of the attempt
    #[serde(skip)]
    pub log: String,
    /// Artifact file name to size in bytes
    pub artifacts: BTreeMap<String, u64>,
    /// Wall time of the attempt
    pub duration_seconds: f64,
    /// Failure reason
    pub failure: Option<String>,
    /// Problems that did not fail the target
    pub warnings: Vec<String>,
    /// States visited, in order
    pub states: Vec<BuildState>,
    /// Log file name relative to the log directory
    pub log_file: Option<String>,
    /// Configuration restore error
    pub restore_error: Option<String>,
    /// Whether a step exceeded its time budget
    pub timed_out: bool,
}

impl BuildResult {
    /// Result for a target that was never attempted
    pub fn skipped(target: &str, reason: &str) -> Self {
        Self {
            target: target.to_string(),
            status: TargetStatus::Skipped,
            success: false,
            log: format!("Skipped: {reason}\n"),
            artifacts: BTreeMap::new(),
            duration_seconds: 0.0,
            failure: Some(reason.to_string()),
            warnings: Vec::new(),
            states: Vec::new(),
            log_file: None,
            restore_error: None,
            timed_out: false,
        }
    }
}

/// Mutable state of an attempt in progress
struct Attempt {
    dir: PathBuf,
    log: String,
    warnings: Vec<String>,
    states: Vec<BuildState>,
    backup: Option<ConfigBackup>,
    artifacts: BTreeMap<String, u64>,
    failure: Option<BuildFailure>,
    restore_error: Option<String>,
}

impl Attempt {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            log: String::new(),
            warnings: Vec::new(),
            states: Vec::new(),
            backup: None,
            artifacts: BTreeMap::new(),
            failure: None,
            restore_error: None,
        }
    }

    fn line(&mut self, text: &str) {
        self.log.push_str(text);
        self.log.push('\n');
    }

    fn section(&mut self, title: &str) {
        let _ = writeln!(self.log, "\n=== {title} ===");
    }

    fn warn(&mut self, text: String) {
        tracing::warn!("{text}");
        let _ = writeln!(self.log, "WARNING: {text}");
        self.warnings.push(text);
    }

    fn record_output(&mut self, output: &CommandOutput) {
        self.log.push_str(&output.transcript());
        match output.code {
            Some(code) => {
                let _ = writeln!(self.log, "Exit code: {code}");
            }
            None => self.line("Terminated by signal"),
        }
    }
}

/// Drives single targets through the build pipeline
pub struct BuildStateMachine<'a, R> {
    runner: &'a R,
    config: &'a BuildConfig,
}

impl<'a, R: CommandRunner> BuildStateMachine<'a, R> {
    /// Create a state machine using `runner` for every external tool
    pub fn new(runner: &'a R, config: &'a BuildConfig) -> Self {
        Self { runner, config }
    }

    /// Attempt one target
    ///
    /// Dropping the returned future mid-step still restores the
    /// configuration through the backup guard.
    pub async fn run(&self, target: &Target) -> BuildResult {
        let started = Instant::now();
        let mut attempt = Attempt::new(&target.path);
        let mut state = BuildState::Init;

        loop {
            attempt.states.push(state);
            tracing::debug!("{}: {state:?}", target.name);

            let step = match state {
                BuildState::Init => Ok(self.init(&mut attempt, target)),
                BuildState::Clean => Ok(self.clean(&mut attempt).await),
                BuildState::Configure => self.configure(&mut attempt).await,
                BuildState::PatchAndReconfigure => self.patch_and_reconfigure(&mut attempt).await,
                BuildState::PackageCheck => Ok(self.check_packages(&mut attempt)),
                BuildState::PackageUpdate => self.update_packages(&mut attempt).await,
                BuildState::Compile => self.compile(&mut attempt).await,
                BuildState::Verify => self.verify(&mut attempt),
                BuildState::Restore => Ok(self.restore(&mut attempt)),
                BuildState::Success | BuildState::Failed => break,
            };

            state = step.unwrap_or_else(|failure| {
                tracing::error!("{}: {failure}", target.name);
                attempt.section("Failure");
                attempt.line(&failure.to_string());
                attempt.failure = Some(failure);
                BuildState::Restore
            });
        }

        let success = state == BuildState::Success;
        let duration = started.elapsed().as_secs_f64();
        let _ = writeln!(
            attempt.log,
            "\n=== Result: {} ({duration:.1}s) ===",
            if success { "SUCCESS" } else { "FAILED" }
        );

        BuildResult {
            target: target.name.clone(),
            status: if success {
                TargetStatus::Success
            } else {
                TargetStatus::Failed
            },
            success,
            log: attempt.log,
            artifacts: attempt.artifacts,
            duration_seconds: duration,
            timed_out: attempt.failure.as_ref().is_some_and(BuildFailure::is_timeout),
            failure: attempt.failure.map(|f| f.to_string()),
            warnings: attempt.warnings,
            states: attempt.states,
            log_file: None,
            restore_error: attempt.restore_error,
        }
    }

    fn init(&self, attempt: &mut Attempt, target: &Target) -> BuildState {
        let _ = writeln!(attempt.log, "BSP: {}", target.name);
        let _ = writeln!(attempt.log, "Path: {}", target.path.display());
        let _ = writeln!(
            attempt.log,
            "Started: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        if self.config.has_overrides() {
            let overrides: Vec<String> = self
                .config
                .temp_kconfig_options
                .iter()
                .map(ToString::to_string)
                .collect();
            let _ = writeln!(attempt.log, "Temporary options: {}", overrides.join(", "));
        }

        if self.config.clean_build {
            BuildState::Clean
        } else {
            BuildState::Configure
        }
    }

    async fn clean(&self, attempt: &mut Attempt) -> BuildState {
        attempt.section(&format!("Clean ({})", self.config.clean_method));
        let notes = clean::pre_build_clean(self.runner, &attempt.dir, self.config).await;
        for note in &notes.notes {
            attempt.line(note);
        }
        for warning in notes.warnings {
            attempt.warn(warning);
        }
        BuildState::Configure
    }

    /// Run the configure step; a non-zero exit is only logged
    async fn run_configure(&self, attempt: &mut Attempt) -> Result<(), BuildFailure> {
        let invocation = Invocation::new(&self.config.tools.build_driver, &attempt.dir)
            .arg("--pyconfig-silent")
            .timeout_secs(self.config.timeouts.configure);
        attempt.section(&format!("Configure: {}", invocation.command_line()));

        let output = self
            .run_step("configure", &invocation, attempt)
            .await?;
        attempt.record_output(&output);
        if !output.success() {
            attempt.line("Configuration returned a non-zero exit code, continuing");
        }
        Ok(())
    }

    async fn configure(&self, attempt: &mut Attempt) -> Result<BuildState, BuildFailure> {
        self.run_configure(attempt).await?;
        Ok(if self.config.has_overrides() {
            BuildState::PatchAndReconfigure
        } else {
            BuildState::PackageCheck
        })
    }

    async fn patch_and_reconfigure(
        &self,
        attempt: &mut Attempt,
    ) -> Result<BuildState, BuildFailure> {
        attempt.section("Apply temporary options");
        match patcher::apply(&attempt.dir, &self.config.temp_kconfig_options) {
            Ok(backup) => {
                for file in backup.files() {
                    attempt.line(&format!("Backed up {}", file.display()));
                }
                for o in &self.config.temp_kconfig_options {
                    attempt.line(&format!("Set {o}"));
                }
                attempt.backup = Some(backup);
            }
            Err(e) => {
                attempt.warn(format!("{e}; building with the original configuration"));
                return Ok(BuildState::PackageCheck);
            }
        }

        self.run_configure(attempt).await?;
        Ok(BuildState::PackageCheck)
    }

    fn check_packages(&self, attempt: &mut Attempt) -> BuildState {
        attempt.section("Package check");

        let config_path = attempt.dir.join(KCONFIG_FILE);
        if !config_path.exists() {
            attempt.line("No .config found, skipping package check");
            return BuildState::Compile;
        }

        let text = match filesystem::read_file(&config_path) {
            Ok(text) => text,
            Err(e) => {
                attempt.warn(format!("{e}; assuming a package update is needed"));
                return BuildState::PackageUpdate;
            }
        };

        let packages_dir = attempt.dir.join(PACKAGES_DIR);
        let inventory = PackageInventory::scan(&packages_dir).unwrap_or_else(|e| {
            attempt.warn(e.to_string());
            PackageInventory::absent()
        });
        let resolution = packages::resolve(&text, &inventory);

        if resolution.required.is_empty() {
            attempt.line("No packages required");
            return BuildState::Compile;
        }
        attempt.line(&format!("Required: {}", join(&resolution.required)));
        attempt.line(&format!("Valid packages: {}", join(&resolution.valid_existing)));

        if resolution.needs_update {
            attempt.line(&format!("Missing: {}", join(&resolution.missing)));
            BuildState::PackageUpdate
        } else {
            attempt.line("All required packages are present");
            BuildState::Compile
        }
    }

    async fn update_packages(&self, attempt: &mut Attempt) -> Result<BuildState, BuildFailure> {
        let packages_dir = attempt.dir.join(PACKAGES_DIR);
        let before: BTreeSet<String> = filesystem::subdirectory_names(&packages_dir)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let invocation = Invocation::new(&self.config.tools.package_manager, &attempt.dir)
            .arg("--update")
            .timeout_secs(self.config.timeouts.package_update);
        attempt.section(&format!("Package update: {}", invocation.command_line()));

        // A missing package manager only skips the update; any other
        // failure to run it fails the target
        let output = match self.run_step("package update", &invocation, attempt).await {
            Ok(output) => output,
            Err(BuildFailure::Step {
                source: RunError::NotFound { program },
                ..
            }) => {
                attempt.warn(PackageResolutionError::ManagerMissing { program }.to_string());
                return Ok(BuildState::Compile);
            }
            Err(failure) => return Err(failure),
        };
        attempt.record_output(&output);

        match packages::verify_update(&packages_dir, &before, &output) {
            Ok(summary) if summary.added.is_empty() => {
                attempt.line("Package update verified, no new packages");
            }
            Ok(summary) => {
                attempt.line(&format!("Downloaded: {}", join(&summary.added)));
            }
            Err(e) => attempt.warn(format!("Package update verification failed: {e}")),
        }
        Ok(BuildState::Compile)
    }

    async fn compile(&self, attempt: &mut Attempt) -> Result<BuildState, BuildFailure> {
        let invocation = Invocation::new(&self.config.tools.build_driver, &attempt.dir)
            .arg(format!("-j{}", self.config.parallel_jobs))
            .timeout_secs(self.config.timeouts.compile);
        attempt.section(&format!("Compile: {}", invocation.command_line()));

        let output = self.run_step("compile", &invocation, attempt).await?;
        attempt.record_output(&output);
        Ok(BuildState::Verify)
    }

    fn verify(&self, attempt: &mut Attempt) -> Result<BuildState, BuildFailure> {
        attempt.section("Verify");

        for ext in SIZED_ARTIFACT_EXTENSIONS {
            let name = format!("{ARTIFACT_STEM}.{ext}");
            if let Ok(meta) = std::fs::metadata(attempt.dir.join(&name)) {
                if meta.is_file() {
                    attempt.line(&format!("{name}: {} bytes", meta.len()));
                    attempt.artifacts.insert(name, meta.len());
                }
            }
        }

        let produced = SUCCESS_ARTIFACT_EXTENSIONS
            .iter()
            .any(|ext| attempt.artifacts.contains_key(&format!("{ARTIFACT_STEM}.{ext}")));
        if produced {
            Ok(BuildState::Restore)
        } else {
            Err(BuildFailure::NoArtifact {
                expected: SUCCESS_ARTIFACT_EXTENSIONS
                    .iter()
                    .map(|ext| format!("{ARTIFACT_STEM}.{ext}"))
                    .collect::<Vec<_>>()
                    .join("/"),
            })
        }
    }

    fn restore(&self, attempt: &mut Attempt) -> BuildState {
        attempt.section("Restore");
        match attempt.backup.take() {
            None => attempt.line("No temporary configuration to restore"),
            Some(backup) => match backup.restore() {
                Ok(files) => {
                    for file in files {
                        attempt.line(&format!("Restored {}", file.display()));
                    }
                }
                Err(e) => {
                    tracing::error!("{e}");
                    attempt.line(&format!("ERROR: {e}"));
                    attempt.restore_error = Some(e.to_string());
                    if attempt.failure.is_none() {
                        attempt.failure = Some(BuildFailure::Restore(e));
                    }
                }
            },
        }

        if attempt.failure.is_none() && attempt.restore_error.is_none() {
            BuildState::Success
        } else {
            BuildState::Failed
        }
    }

    /// Run a step whose timeout or spawn failure fails the target
    async fn run_step(
        &self,
        step: &'static str,
        invocation: &Invocation,
        attempt: &mut Attempt,
    ) -> Result<CommandOutput, BuildFailure> {
        self.runner.run(invocation).await.map_err(|source| {
            if source.is_timeout() {
                attempt.line(&format!(
                    "TIMEOUT: {step} exceeded {}s",
                    invocation.timeout.as_secs()
                ));
            }
            BuildFailure::Step { step, source }
        })
    }
}

fn join(names: &BTreeSet<String>) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
