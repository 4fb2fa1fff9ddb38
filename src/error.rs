//! Error types for bspcheck
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::target::TargetStatus;

/// Configuration loading errors (fatal at startup)
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config file is not valid JSON or has wrongly typed keys
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Override entry is not of the form KEY=VALUE
    #[error("Invalid temporary option '{entry}': expected KEY=VALUE")]
    InvalidOverride { entry: String },

    /// Nothing left to build after exclusions
    #[error("No BSPs to test")]
    NoTargets,

    /// BSP directory could not be located
    #[error("Cannot find RT-Thread root directory from '{start}'. Run from within the repository or pass --bsp-dir")]
    RootNotFound { start: PathBuf },

    /// BSP directory given explicitly does not exist
    #[error("BSP directory not found: {path}")]
    BspDirNotFound { path: PathBuf },
}

/// Build environment errors (fatal before any target runs)
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// Required tool not found in PATH
    #[error("{tool} not found in PATH. {suggestion}")]
    ToolMissing { tool: String, suggestion: String },

    /// Tool exists but does not answer `--version`
    #[error("{tool} is not responding: {error}")]
    ToolUnresponsive { tool: String, error: String },

    /// Target list variable for the CI collaborator is unset
    #[error("{var} environment variable is not set")]
    MissingTargetList { var: String },

    /// One or more listed target paths are invalid
    #[error("{count} BSP path(s) failed verification")]
    InvalidTargetPaths { count: usize },
}

/// External process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Program not found
    #[error("'{program}' command not found")]
    NotFound { program: String },

    /// Program could not be started
    #[error("Failed to start '{program}': {error}")]
    Spawn { program: String, error: String },

    /// Program exceeded its time budget
    #[error("'{program}' timed out (>{seconds}s)")]
    Timeout { program: String, seconds: u64 },

    /// Output could not be collected
    #[error("IO error while running '{program}': {error}")]
    Io { program: String, error: String },
}

impl RunError {
    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration patch errors
#[derive(Error, Debug)]
pub enum PatchError {
    /// The configuration file to patch does not exist
    #[error("Config file not found: {path}")]
    ConfigMissing { path: PathBuf },

    /// Backup copy could not be created
    #[error("Failed to back up '{path}': {error}")]
    Backup { path: PathBuf, error: String },

    /// Patched content could not be read or written
    #[error("Failed to patch '{path}': {error}")]
    Rewrite { path: PathBuf, error: String },
}

/// Backup could not be moved back over the working file.
///
/// The configuration of the target may now differ from what was committed.
#[derive(Error, Debug, Clone)]
#[error("Failed to restore '{path}' from backup: {error}. The configuration may be corrupted")]
pub struct ConfigRestoreError {
    pub path: PathBuf,
    pub error: String,
}

/// Why a target attempt failed
#[derive(Error, Debug, Clone)]
pub enum BuildFailure {
    /// An external step could not run to completion
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: RunError,
    },

    /// The build finished without producing firmware
    #[error("Build completed but no firmware file ({expected}) was produced")]
    NoArtifact { expected: String },

    /// The original configuration could not be put back
    #[error(transparent)]
    Restore(#[from] ConfigRestoreError),
}

impl BuildFailure {
    /// Whether the failure was a step timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Step { source, .. } if source.is_timeout())
    }
}

/// Package update verification failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageResolutionError {
    /// Package manager exited with a failure code
    #[error("package update returned non-zero exit code: {code}")]
    ExitCode { code: i32 },

    /// Package manager was killed by a signal
    #[error("package update terminated without an exit code")]
    Terminated,

    /// Package directory absent after the update
    #[error("packages directory does not exist after update")]
    DirectoryMissing,

    /// Package directory empty after the update
    #[error("packages directory is empty after update")]
    DirectoryEmpty,

    /// Output mentions errors and nothing new was fetched
    #[error("package update reported errors and no new packages were downloaded")]
    ReportedErrors,

    /// No package carries source or header files
    #[error("packages directory exists but contains no valid source files")]
    NoValidPackages,

    /// Package manager binary missing
    #[error("'{program}' command not found, package update skipped")]
    ManagerMissing { program: String },
}

/// A single cleanup item that could not be removed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to remove '{path}': {error}")]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Target lifecycle violations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    /// Terminal status assigned twice
    #[error("Target '{target}' already finished as {status:?}")]
    AlreadyTerminal { target: String, status: TargetStatus },

    /// Non-terminal status passed where a terminal one is required
    #[error("Status {status:?} is not terminal")]
    NotTerminal { status: TargetStatus },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Top-level bspcheck error type
#[derive(Error, Debug)]
pub enum BspCheckError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigLoadError),

    /// Environment error
    #[error("Environment check failed: {0}")]
    Environment(#[from] EnvironmentError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Lifecycle error
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Report serialization error
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
