//! CI target path verification
//!
//! The CI build collaborator receives its targets as a comma-separated list
//! in `SRTT_BSP`, each entry relative to `<root>/bsp/`. Every entry must be
//! an existing directory; build files are reported but not required.

use std::path::{Path, PathBuf};

use crate::config::defaults::TARGET_MARKER;
use crate::error::EnvironmentError;

/// Kconfig entry file of a target
pub const KCONFIG_ENTRY: &str = "Kconfig";

/// Why an entry failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
    Missing,
    NotADirectory,
}

/// Verification result for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    /// Entry as listed
    pub entry: String,
    /// Resolved directory
    pub path: PathBuf,
    pub problem: Option<PathProblem>,
    pub has_kconfig: bool,
    pub has_sconstruct: bool,
    /// Number of directory entries, when listable
    pub file_count: Option<usize>,
}

impl PathCheck {
    pub fn is_valid(&self) -> bool {
        self.problem.is_none()
    }
}

/// Split a comma-separated target list, dropping blank entries
pub fn parse_target_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Require a non-blank target list taken from `var`
pub fn require_target_list(value: Option<&str>, var: &str) -> Result<Vec<String>, EnvironmentError> {
    match value.map(parse_target_list) {
        Some(entries) if !entries.is_empty() => Ok(entries),
        _ => Err(EnvironmentError::MissingTargetList {
            var: var.to_string(),
        }),
    }
}

/// Verify one entry under `<root>/bsp/`
pub fn verify_path(root: &Path, entry: &str) -> PathCheck {
    let path = root.join("bsp").join(entry);

    let problem = if !path.exists() {
        Some(PathProblem::Missing)
    } else if !path.is_dir() {
        Some(PathProblem::NotADirectory)
    } else {
        None
    };

    let file_count = problem
        .is_none()
        .then(|| std::fs::read_dir(&path).ok().map(Iterator::count))
        .flatten();

    PathCheck {
        entry: entry.to_string(),
        has_kconfig: path.join(KCONFIG_ENTRY).exists(),
        has_sconstruct: path.join(TARGET_MARKER).exists(),
        path,
        problem,
        file_count,
    }
}

/// Verify every entry, failing if any is invalid
pub fn verify_paths(root: &Path, entries: &[String]) -> (Vec<PathCheck>, Result<(), EnvironmentError>) {
    let checks: Vec<PathCheck> = entries.iter().map(|e| verify_path(root, e)).collect();
    let invalid = checks.iter().filter(|c| !c.is_valid()).count();
    let verdict = if invalid == 0 {
        Ok(())
    } else {
        Err(EnvironmentError::InvalidTargetPaths { count: invalid })
    };
    (checks, verdict)
}
