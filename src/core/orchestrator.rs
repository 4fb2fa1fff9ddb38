//! Sequential target orchestration
//!
//! Targets are attempted one at a time in list order. Each target moves
//! `Pending -> Running -> {Success, Failed}` or `Pending -> Skipped`, and its
//! log is written to `<log_dir>/<target>.log` once the attempt is over.

use std::path::{Path, PathBuf};

use crate::core::machine::{BuildResult, BuildStateMachine};
use crate::core::settings::BuildConfig;
use crate::core::target::{Target, TargetStatus};
use crate::error::BspCheckError;
use crate::infra::filesystem;
use crate::infra::process::CommandRunner;

/// Receives progress notifications from the orchestrator
pub trait BuildObserver {
    /// A target attempt is starting
    fn started(&self, _target: &Target, _index: usize, _total: usize) {}

    /// A target reached its terminal status
    fn finished(&self, _result: &BuildResult) {}
}

impl BuildObserver for () {}

/// Runs the state machine over a target list
pub struct Orchestrator<'a, R> {
    runner: &'a R,
    config: &'a BuildConfig,
    log_dir: PathBuf,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    /// Create an orchestrator writing logs under `log_dir`
    pub fn new(runner: &'a R, config: &'a BuildConfig, log_dir: &Path) -> Self {
        Self {
            runner,
            config,
            log_dir: log_dir.to_path_buf(),
        }
    }

    /// Attempt every target, returning one result per target in order
    pub async fn run(
        &self,
        targets: &mut [Target],
        observer: &impl BuildObserver,
    ) -> Result<Vec<BuildResult>, BspCheckError> {
        filesystem::create_dir_all(&self.log_dir)?;

        let machine = BuildStateMachine::new(self.runner, self.config);
        let total = targets.len();
        let mut results = Vec::with_capacity(total);

        for (index, target) in targets.iter_mut().enumerate() {
            observer.started(target, index, total);

            let mut result = if target.path.is_dir() {
                target.start()?;
                tracing::info!("[{}/{total}] Building {}", index + 1, target.name);
                machine.run(target).await
            } else {
                tracing::warn!("BSP directory not found: {}", target.path.display());
                BuildResult::skipped(
                    &target.name,
                    &format!("directory not found: {}", target.path.display()),
                )
            };

            target.finish(result.status)?;
            tracing::info!("{}: {}", target.name, result.status.label());
            if result.status != TargetStatus::Skipped {
                result.log_file = self.write_log(&result);
            }

            observer.finished(&result);
            results.push(result);
        }

        Ok(results)
    }

    fn write_log(&self, result: &BuildResult) -> Option<String> {
        let file_name = format!("{}.log", result.target);
        match filesystem::write_file(&self.log_dir.join(&file_name), &result.log) {
            Ok(()) => Some(file_name),
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }
}
