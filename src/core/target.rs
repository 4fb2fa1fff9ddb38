//! BSP targets and their lifecycle
//!
//! A [`Target`] is created `Pending` when the run starts and moves to exactly
//! one terminal status. Target lists are filtered here, and targets are
//! auto-detected when no configuration names them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{NON_TARGET_DIRS, TARGET_MARKER};
use crate::error::{FilesystemError, LifecycleError};
use crate::infra::filesystem;

/// Lifecycle status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl TargetStatus {
    /// Whether the status ends the lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
        }
    }
}

/// One board configuration to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Directory name of the BSP
    pub name: String,
    /// Absolute or working-directory-relative path
    pub path: PathBuf,
    status: TargetStatus,
}

impl Target {
    /// Create a pending target
    pub fn new(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            path,
            status: TargetStatus::Pending,
        }
    }

    /// Current status
    pub fn status(&self) -> TargetStatus {
        self.status
    }

    /// Mark the target as being built
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::AlreadyTerminal {
                target: self.name.clone(),
                status: self.status,
            });
        }
        self.status = TargetStatus::Running;
        Ok(())
    }

    /// Assign the terminal status; allowed once
    pub fn finish(&mut self, status: TargetStatus) -> Result<(), LifecycleError> {
        if !status.is_terminal() {
            return Err(LifecycleError::NotTerminal { status });
        }
        if self.status.is_terminal() {
            return Err(LifecycleError::AlreadyTerminal {
                target: self.name.clone(),
                status: self.status,
            });
        }
        self.status = status;
        Ok(())
    }
}

/// Build the ordered target list: configured names minus exclusions
///
/// Order follows `names`; repeated names are kept once.
pub fn select_targets(bsp_dir: &Path, names: &[String], excluded: &[String]) -> Vec<Target> {
    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    names
        .iter()
        .filter(|name| !excluded.contains(name.as_str()))
        .filter(|name| seen.insert(name.as_str()))
        .map(|name| Target::new(name, bsp_dir.join(name)))
        .collect()
}

/// Detect every target under `bsp_dir`
///
/// A target is a non-hidden subdirectory with a build description that is
/// not one of the shared support directories.
pub fn detect_targets(bsp_dir: &Path) -> Result<Vec<String>, FilesystemError> {
    Ok(filesystem::subdirectory_names(bsp_dir)?
        .into_iter()
        .filter(|name| !NON_TARGET_DIRS.contains(&name.as_str()))
        .filter(|name| bsp_dir.join(name).join(TARGET_MARKER).is_file())
        .collect())
}
