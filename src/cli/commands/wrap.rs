//! CLI command for `bspcheck wrap`
//!
//! Verifies the CI target paths and only then hands over to the CI build
//! command, forwarding its exit code.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::cli::output::{print_error, print_success};

use super::verify_paths;

/// Execute the wrap command
pub async fn execute(root: &Path, bsps: Option<&str>, command: &[String]) -> Result<i32> {
    let code = verify_paths::execute(root, bsps)?;
    if code != 0 {
        return Ok(code);
    }

    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("No build command given");
    };

    tracing::info!("Running `{}`", command.join(" "));
    let status = Command::new(program)
        .args(args)
        .current_dir(root)
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("Failed to run '{program}'"))?;

    match status.code() {
        Some(0) => {
            print_success("Build command completed");
            Ok(0)
        }
        Some(code) => {
            print_error(&format!("Build command failed with exit code {code}"));
            Ok(code)
        }
        None => {
            print_error("Build command was terminated by a signal");
            Ok(1)
        }
    }
}
