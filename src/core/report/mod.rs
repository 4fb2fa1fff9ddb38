//! Run summary and persisted reports
//!
//! [`ResultAggregator`] collects [`BuildResult`]s in processing order and
//! produces a [`Report`], which is written as
//! `build_test_report_<YYYYmmdd_HHMMSS>.json` and `.html` into the log
//! directory.

mod html;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::machine::BuildResult;
use crate::core::settings::BuildConfig;
use crate::core::target::TargetStatus;
use crate::error::BspCheckError;
use crate::infra::filesystem;

pub use html::render_html;

/// Prefix of report file names
pub const REPORT_PREFIX: &str = "build_test_report";

/// Collects results while targets are processed
#[derive(Debug)]
pub struct ResultAggregator {
    start_time: DateTime<Local>,
    results: Vec<BuildResult>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    /// Start aggregating now
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Start aggregating with an explicit start time
    pub fn starting_at(start_time: DateTime<Local>) -> Self {
        Self {
            start_time,
            results: Vec::new(),
        }
    }

    /// Add one result
    pub fn push(&mut self, result: BuildResult) {
        self.results.push(result);
    }

    /// Add several results, keeping their order
    pub fn extend(&mut self, results: impl IntoIterator<Item = BuildResult>) {
        self.results.extend(results);
    }

    /// Close the run
    pub fn finish(self, config: &BuildConfig) -> Report {
        self.finish_at(Local::now(), config)
    }

    /// Close the run with an explicit end time
    pub fn finish_at(self, end_time: DateTime<Local>, config: &BuildConfig) -> Report {
        let mut results = GroupedResults::default();
        for result in self.results {
            match result.status {
                TargetStatus::Success => results.success.push(result),
                TargetStatus::Skipped => results.skipped.push(result),
                _ => results.failed.push(result),
            }
        }

        let attempted = results.success.len() + results.failed.len();
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if attempted == 0 {
            0.0
        } else {
            results.success.len() as f64 / attempted as f64 * 100.0
        };
        #[allow(clippy::cast_precision_loss)]
        let duration_seconds = (end_time - self.start_time).num_milliseconds() as f64 / 1000.0;

        Report {
            start_time: self.start_time,
            end_time,
            duration_seconds,
            total: attempted,
            success: results.success.len(),
            failed: results.failed.len(),
            skipped: results.skipped.len(),
            success_rate,
            results,
            config: config.clone(),
        }
    }
}

/// Results grouped by terminal status, each in processing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedResults {
    pub success: Vec<BuildResult>,
    pub failed: Vec<BuildResult>,
    pub skipped: Vec<BuildResult>,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
    /// Attempted targets (success + failed)
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage of attempted targets that succeeded
    pub success_rate: f64,
    pub results: GroupedResults,
    /// Effective configuration of the run
    pub config: BuildConfig,
}

/// Paths of the written report files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub json: PathBuf,
    pub html: PathBuf,
}

impl Report {
    /// Process exit code: 0 only if something was attempted and nothing failed
    pub fn exit_code(&self) -> i32 {
        i32::from(self.total == 0 || self.failed > 0)
    }

    /// Every result in success, failed, skipped order
    pub fn all_results(&self) -> impl Iterator<Item = &BuildResult> {
        self.results
            .success
            .iter()
            .chain(&self.results.failed)
            .chain(&self.results.skipped)
    }

    /// Results whose configuration could not be restored
    pub fn restore_failures(&self) -> impl Iterator<Item = &BuildResult> {
        self.all_results().filter(|r| r.restore_error.is_some())
    }

    /// File stem shared by the JSON and HTML reports
    pub fn file_stem(&self) -> String {
        format!("{REPORT_PREFIX}_{}", self.start_time.format("%Y%m%d_%H%M%S"))
    }

    /// Write the JSON and HTML reports into `log_dir`
    pub fn write(&self, log_dir: &Path) -> Result<ReportFiles, BspCheckError> {
        let stem = self.file_stem();
        let files = ReportFiles {
            json: log_dir.join(format!("{stem}.json")),
            html: log_dir.join(format!("{stem}.html")),
        };

        let json = serde_json::to_string_pretty(self)?;
        filesystem::write_file(&files.json, &json)?;
        filesystem::write_file(&files.html, &render_html(self))?;

        tracing::info!("Reports written to {}", log_dir.display());
        Ok(files)
    }
}
