//! bspcheck - build verification for embedded BSP targets
//!
//! This library drives a fleet of board support packages through
//! configure, package resolution, compile and artifact verification, and
//! aggregates the outcomes into reports.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic: settings, state machine, reports
//! - [`infra`] - Infrastructure layer (filesystem, processes)
//! - [`config`] - Constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
