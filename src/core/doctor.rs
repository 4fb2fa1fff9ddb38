//! Build environment check
//!
//! Runs before any target is attempted. The build driver and the cross
//! compiler are required; the package manager is optional.

use std::path::{Path, PathBuf};

use crate::config::defaults::TOOL_PROBE_TIMEOUT_SECS;
use crate::core::settings::Tools;
use crate::error::EnvironmentError;
use crate::infra::process::{CommandRunner, Invocation};

/// Result of a single tool check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Tool name as configured
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Resolved executable
    pub path: Option<PathBuf>,
    /// First line of the `--version` output
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether a failure stops the run
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, path: PathBuf, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            path: Some(path),
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(
        name: &str,
        path: Option<PathBuf>,
        error: &str,
        suggestion: &str,
        required: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            path,
            version: None,
            error: Some(error.to_string()),
            suggestion: Some(suggestion.to_string()),
            required,
        }
    }
}

/// Overall environment report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks
            .iter()
            .filter(|c| c.required)
            .all(|c| c.passed)
    }

    /// Get all failed required checks
    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }

    /// Get all failed optional checks
    pub fn failed_optional(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.required && !c.passed)
            .collect()
    }

    /// Turn the first failed required check into an error
    pub fn ensure_ready(&self) -> Result<(), EnvironmentError> {
        let Some(check) = self.failed_required().into_iter().next() else {
            return Ok(());
        };
        let error = check.error.clone().unwrap_or_default();
        Err(if check.path.is_none() {
            EnvironmentError::ToolMissing {
                tool: check.name.clone(),
                suggestion: check.suggestion.clone().unwrap_or_default(),
            }
        } else {
            EnvironmentError::ToolUnresponsive {
                tool: check.name.clone(),
                error,
            }
        })
    }
}

/// Locate `program` and probe it with `--version`
pub async fn check_tool<R: CommandRunner>(
    runner: &R,
    program: &str,
    required: bool,
    suggestion: &str,
    cwd: &Path,
) -> CheckResult {
    let Ok(path) = which::which(program) else {
        return CheckResult::fail(
            program,
            None,
            &format!("{program} not found in PATH"),
            suggestion,
            required,
        );
    };

    let invocation = Invocation::new(&path.to_string_lossy(), cwd)
        .arg("--version")
        .timeout_secs(TOOL_PROBE_TIMEOUT_SECS);

    match runner.run(&invocation).await {
        Ok(output) if output.success() => {
            let version = output.first_line().map(ToString::to_string);
            CheckResult::pass(program, path, version, required)
        }
        Ok(output) => CheckResult::fail(
            program,
            Some(path),
            &format!(
                "`{program} --version` exited with {}",
                output.code.map_or_else(|| "a signal".to_string(), |c| c.to_string())
            ),
            suggestion,
            required,
        ),
        Err(e) => CheckResult::fail(program, Some(path), &e.to_string(), suggestion, required),
    }
}

/// Check every external tool a run depends on
pub async fn run_doctor<R: CommandRunner>(runner: &R, tools: &Tools, cwd: &Path) -> DoctorReport {
    let mut report = DoctorReport::default();

    report.checks.push(
        check_tool(
            runner,
            &tools.build_driver,
            true,
            "Install it with: pip install scons",
            cwd,
        )
        .await,
    );
    report.checks.push(
        check_tool(
            runner,
            &tools.compiler,
            true,
            "Make sure the ARM GCC toolchain is in PATH or set RTT_EXEC_PATH",
            cwd,
        )
        .await,
    );
    report.checks.push(
        check_tool(
            runner,
            &tools.package_manager,
            false,
            "Some BSPs need packages; install the RT-Thread env tools if needed",
            cwd,
        )
        .await,
    );

    for check in &report.checks {
        if check.passed {
            tracing::debug!("{} found: {:?}", check.name, check.version);
        } else if check.required {
            tracing::error!("{}", check.error.as_deref().unwrap_or_default());
        } else {
            tracing::warn!("{} (optional)", check.error.as_deref().unwrap_or_default());
        }
    }

    report
}
