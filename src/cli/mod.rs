//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::core::settings::CleanMethod;
use commands::run::RunOptions;
use commands::Commands;

/// bspcheck - build verification for BSP targets
///
/// Builds every configured board support package, checks that firmware was
/// produced, and writes per-target logs plus JSON and HTML reports.
#[derive(Parser, Debug)]
#[command(name = "bspcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Build only these BSPs (replaces the configured list)
    #[arg(short, long, value_name = "NAME", num_args = 1..)]
    pub bsps: Option<Vec<String>>,

    /// Clean each BSP before building
    #[arg(long)]
    pub clean: bool,

    /// How to clean
    #[arg(long, value_enum)]
    pub clean_method: Option<CleanMethod>,

    /// Only remove build byproducts, do not build
    #[arg(long)]
    pub cleanup_all: bool,

    /// Directory holding the BSPs
    #[arg(long, value_name = "DIR")]
    pub bsp_dir: Option<PathBuf>,

    /// Directory for logs and reports
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;

        if let Some(cmd) = self.command {
            return cmd.run(&cwd).await;
        }

        let options = RunOptions {
            config: self.config,
            bsps: self.bsps,
            clean: self.clean,
            clean_method: self.clean_method,
            cleanup_all: self.cleanup_all,
            bsp_dir: self.bsp_dir,
            log_dir: self.log_dir,
        };
        commands::run::execute(&cwd, options).await
    }
}
