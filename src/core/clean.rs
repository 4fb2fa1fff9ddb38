//! Build byproduct removal
//!
//! Two entry points share the byproduct rules:
//!
//! - [`pre_build_clean`] runs inside a target attempt when a clean build is
//!   requested. Every problem is a warning.
//! - [`cleanup_target`] / [`cleanup_targets`] implement cleanup-only mode.
//!   Each deletion is independent and failures are recorded per item.
//!
//! Neither ever removes source files, package directories, or
//! subdirectories other than `build/`.

use std::path::{Path, PathBuf};

use crate::config::defaults::{
    ARTIFACT_STEM, BOOKKEEPING_FILES, BUILD_DIR, CLEANUP_IMAGE_EXTENSIONS,
    CLEANUP_OBJECT_EXTENSIONS, CLEAN_OUTPUT_EXTENSIONS, GENERATED_CONFIG_FILES,
};
use crate::core::settings::BuildConfig;
use crate::core::target::Target;
use crate::error::CleanupFailure;
use crate::infra::filesystem;
use crate::infra::process::{CommandRunner, Invocation};

/// What a pre-build clean did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanNotes {
    /// Log lines
    pub notes: Vec<String>,
    /// Problems that did not stop the build
    pub warnings: Vec<String>,
}

/// Clean a target before compiling, according to the configured method
pub async fn pre_build_clean<R: CommandRunner>(
    runner: &R,
    target_dir: &Path,
    config: &BuildConfig,
) -> CleanNotes {
    let mut result = CleanNotes::default();

    if config.clean_method.uses_tool() {
        let invocation = Invocation::new(&config.tools.build_driver, target_dir)
            .arg("-c")
            .timeout_secs(config.timeouts.clean);
        match runner.run(&invocation).await {
            Ok(output) if output.success() => {
                result.notes.push(format!("`{}` completed", invocation.command_line()));
            }
            Ok(output) => result.warnings.push(format!(
                "`{}` returned exit code {}",
                invocation.command_line(),
                output.code.map_or_else(|| "none".to_string(), |c| c.to_string())
            )),
            Err(e) => result.warnings.push(format!("Clean failed: {e}")),
        }
    }

    if config.clean_method.deletes_directory() {
        let build_dir = target_dir.join(BUILD_DIR);
        if config.keep_build_dir {
            result
                .notes
                .push(format!("Keeping {} (keep_build_dir)", build_dir.display()));
        } else if build_dir.exists() {
            match filesystem::remove_dir_all(&build_dir) {
                Ok(()) => result.notes.push(format!("Removed {}", build_dir.display())),
                Err(e) => result.warnings.push(e.to_string()),
            }
        }
    }

    for path in matching_files(target_dir, |name| has_extension(name, CLEAN_OUTPUT_EXTENSIONS)) {
        match std::fs::remove_file(&path) {
            Ok(()) => result.notes.push(format!("Removed {}", path.display())),
            Err(e) => result
                .warnings
                .push(format!("Failed to remove {}: {e}", path.display())),
        }
    }

    result
}

/// Outcome of cleaning one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Target name
    pub target: String,
    /// Paths removed
    pub removed: Vec<PathBuf>,
    /// Items that could not be removed
    pub failures: Vec<CleanupFailure>,
    /// Target directory did not exist
    pub missing: bool,
}

impl CleanupReport {
    /// Whether the target was cleaned without problems
    pub fn is_clean(&self) -> bool {
        !self.missing && self.failures.is_empty()
    }
}

/// Remove every build byproduct of one target
pub fn cleanup_target(target: &Target) -> CleanupReport {
    let mut report = CleanupReport {
        target: target.name.clone(),
        removed: Vec::new(),
        failures: Vec::new(),
        missing: false,
    };

    if !target.path.is_dir() {
        tracing::warn!("BSP directory not found: {}", target.path.display());
        report.missing = true;
        return report;
    }

    let build_dir = target.path.join(BUILD_DIR);
    if build_dir.is_dir() {
        record(&mut report, build_dir.clone(), std::fs::remove_dir_all(&build_dir));
    }

    for path in matching_files(&target.path, is_cleanup_byproduct) {
        let result = std::fs::remove_file(&path);
        record(&mut report, path, result);
    }

    report
}

/// Clean every target, continuing past missing directories and failures
pub fn cleanup_targets(targets: &[Target]) -> Vec<CleanupReport> {
    targets
        .iter()
        .map(|target| {
            tracing::info!("Cleaning {}", target.name);
            cleanup_target(target)
        })
        .collect()
}

fn record(report: &mut CleanupReport, path: PathBuf, result: std::io::Result<()>) {
    match result {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            report.removed.push(path);
        }
        Err(e) => {
            let failure = CleanupFailure {
                path,
                error: e.to_string(),
            };
            tracing::warn!("{failure}");
            report.failures.push(failure);
        }
    }
}

/// Whether a file directly under a target directory is a cleanup byproduct
pub fn is_cleanup_byproduct(name: &str) -> bool {
    if BOOKKEEPING_FILES.contains(&name) || GENERATED_CONFIG_FILES.contains(&name) {
        return true;
    }
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if stem == ARTIFACT_STEM && CLEANUP_IMAGE_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    has_extension(name, CLEANUP_OBJECT_EXTENSIONS)
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && extensions.contains(&ext))
}

/// Regular files directly under `dir` whose name satisfies `keep`
fn matching_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| entry.file_name().to_str().is_some_and(&keep))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    files
}
