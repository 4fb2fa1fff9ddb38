//! Core business logic module
//!
//! External tools are reached only through
//! [`crate::infra::process::CommandRunner`].
//!
//! # Submodules
//!
//! - [`settings`] - Configuration file loading and resolution
//! - [`target`] - Target lifecycle, selection and detection
//! - [`packages`] - Package requirement resolution
//! - [`patcher`] - Temporary Kconfig overrides with guaranteed restore
//! - [`clean`] - Build byproduct removal
//! - [`machine`] - Per-target build state machine
//! - [`orchestrator`] - Sequential target iteration and log files
//! - [`report`] - Aggregation and JSON/HTML reports
//! - [`doctor`] - Build environment check
//! - [`ci`] - CI target path verification

pub mod ci;
pub mod clean;
pub mod doctor;
pub mod machine;
pub mod orchestrator;
pub mod packages;
pub mod patcher;
pub mod report;
pub mod settings;
pub mod target;
