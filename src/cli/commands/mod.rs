//! CLI command implementations
//!
//! Each command is implemented in its own submodule. Running without a
//! subcommand builds the configured targets ([`run`]).

pub mod cleanup;
pub mod run;
pub mod verify_paths;
pub mod wrap;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use crate::config::defaults::TARGET_LIST_VAR;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that every BSP listed in SRTT_BSP exists under <root>/bsp
    VerifyPaths {
        /// Comma-separated BSP paths relative to <root>/bsp
        #[arg(long, env = TARGET_LIST_VAR, hide_env_values = true)]
        bsps: Option<String>,

        /// RT-Thread root (defaults to the working directory)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },

    /// Verify SRTT_BSP paths, then run a CI build command and forward its exit code
    Wrap {
        /// Comma-separated BSP paths relative to <root>/bsp
        #[arg(long, env = TARGET_LIST_VAR, hide_env_values = true)]
        bsps: Option<String>,

        /// RT-Thread root (defaults to the working directory)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Build command and its arguments
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub async fn run(self, cwd: &Path) -> Result<i32> {
        match self {
            Self::VerifyPaths { bsps, root } => {
                let root = root.unwrap_or_else(|| cwd.to_path_buf());
                verify_paths::execute(&root, bsps.as_deref())
            }
            Self::Wrap {
                bsps,
                root,
                command,
            } => {
                let root = root.unwrap_or_else(|| cwd.to_path_buf());
                wrap::execute(&root, bsps.as_deref(), &command).await
            }
        }
    }
}
