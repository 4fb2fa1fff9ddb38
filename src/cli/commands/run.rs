//! Default command: build and verify every configured BSP
//!
//! Loads settings, checks the build environment, runs the orchestrator and
//! writes the reports. With `--cleanup-all` it only removes byproducts.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::cli::output::{
    create_spinner, print_detail, print_error, print_info, print_success, print_warning, status,
};
use crate::config::defaults::LOG_DIR;
use crate::core::doctor::run_doctor;
use crate::core::machine::BuildResult;
use crate::core::orchestrator::{BuildObserver, Orchestrator};
use crate::core::report::{Report, ResultAggregator};
use crate::core::settings::{
    discover_config, load_config, locate_bsp_dir, BuildConfig, CleanMethod, CliOverrides,
    FileConfig,
};
use crate::core::target::{detect_targets, select_targets, Target, TargetStatus};
use crate::error::ConfigLoadError;
use crate::infra::process::SystemRunner;

use super::cleanup;

/// Run options taken from the command line
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub bsps: Option<Vec<String>>,
    pub clean: bool,
    pub clean_method: Option<CleanMethod>,
    pub cleanup_all: bool,
    pub bsp_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

/// Everything resolved before the first target is touched
struct Prepared {
    config: BuildConfig,
    targets: Vec<Target>,
    log_dir: PathBuf,
}

/// Execute the default command
pub async fn execute(cwd: &Path, options: RunOptions) -> Result<i32> {
    let Prepared {
        config,
        mut targets,
        log_dir,
    } = prepare(cwd, &options)?;

    if options.cleanup_all {
        return Ok(cleanup::execute(&targets));
    }

    print_info("Checking build environment...");
    let runner = SystemRunner;
    let doctor = run_doctor(&runner, &config.tools, cwd).await;
    for check in &doctor.checks {
        if check.passed {
            let version = check.version.as_deref().unwrap_or("unknown version");
            print_detail(&format!("{} {}: {version}", status::SUCCESS, check.name));
        } else if check.required {
            print_detail(&format!(
                "{} {}",
                status::ERROR,
                check.error.as_deref().unwrap_or_default()
            ));
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("  {suggestion}"));
            }
        } else {
            print_detail(&format!(
                "{} {} (optional)",
                status::WARNING,
                check.error.as_deref().unwrap_or_default()
            ));
        }
    }
    let optional_missing = doctor.failed_optional().len();
    if optional_missing > 0 {
        print_warning(&format!(
            "{optional_missing} optional tool(s) unavailable, some BSPs may fail"
        ));
    }
    if doctor.all_required_passed() {
        print_success("Build environment ready");
    }
    doctor
        .ensure_ready()
        .context("Fix the environment issues and try again")?;

    print_info(&format!("BSPs to test: {}", targets.len()));
    if !config.excluded_bsps.is_empty() {
        print_info(&format!("Excluded BSPs: {}", config.excluded_bsps.join(", ")));
    }
    print_detail(
        &targets
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );

    let mut aggregator = ResultAggregator::new();
    let observer = SpinnerObserver::default();
    let results = Orchestrator::new(&runner, &config, &log_dir)
        .run(&mut targets, &observer)
        .await?;
    aggregator.extend(results);

    let report = aggregator.finish(&config);
    let files = report.write(&log_dir)?;
    print_summary(&report);
    print_info(&format!("JSON report: {}", files.json.display()));
    print_info(&format!("HTML report: {}", files.html.display()));

    Ok(report.exit_code())
}

fn prepare(cwd: &Path, options: &RunOptions) -> Result<Prepared> {
    let bsp_dir = locate_bsp_dir(cwd, options.bsp_dir.as_deref())?;
    tracing::info!("BSP directory: {}", bsp_dir.display());

    let config_path = options
        .config
        .clone()
        .or_else(|| discover_config(cwd, &bsp_dir));

    let file = match config_path {
        Some(path) => {
            let loaded = load_config(&path)?;
            print_info(&format!(
                "Configuration: {}{}",
                loaded.path.display(),
                if loaded.namespaced { " (unified)" } else { "" }
            ));
            if let Some(deprecation) = &loaded.deprecation {
                print_warning(&format!("{} is deprecated", loaded.path.display()));
                if let Some(note) = &deprecation.note {
                    print_detail(note);
                }
                if let Some(new_file) = &deprecation.new_file {
                    print_detail(&format!("Use {new_file} instead"));
                }
            }
            loaded.file
        }
        None => {
            print_info("No configuration file found, detecting BSPs");
            FileConfig::default()
        }
    };

    let cli = CliOverrides {
        targets: options.bsps.clone(),
        clean_build: options.clean.then_some(true),
        clean_method: options.clean_method,
    };
    let config = BuildConfig::resolve(file, &cli, || {
        detect_targets(&bsp_dir).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            Vec::new()
        })
    });

    let targets = select_targets(&bsp_dir, &config.test_bsps, &config.excluded_bsps);
    if targets.is_empty() {
        return Err(ConfigLoadError::NoTargets.into());
    }

    let log_dir = options
        .log_dir
        .clone()
        .unwrap_or_else(|| cwd.join(LOG_DIR));

    Ok(Prepared {
        config,
        targets,
        log_dir,
    })
}

/// Shows a spinner while a target builds and a status line when it ends
#[derive(Default)]
struct SpinnerObserver {
    spinner: RefCell<Option<ProgressBar>>,
}

impl BuildObserver for SpinnerObserver {
    fn started(&self, target: &Target, index: usize, total: usize) {
        let spinner = create_spinner(&format!("[{}/{total}] Building {}", index + 1, target.name));
        self.spinner.replace(Some(spinner));
    }

    fn finished(&self, result: &BuildResult) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        match result.status {
            TargetStatus::Success => print_success(&format!(
                "{} ({:.1}s)",
                result.target, result.duration_seconds
            )),
            TargetStatus::Skipped => print_warning(&format!(
                "{} skipped: {}",
                result.target,
                result.failure.as_deref().unwrap_or_default()
            )),
            _ => print_error(&format!(
                "{}: {}",
                result.target,
                result.failure.as_deref().unwrap_or("failed")
            )),
        }
        for warning in &result.warnings {
            print_detail(&format!("{} {warning}", status::WARNING));
        }
    }
}

fn print_summary(report: &Report) {
    println!();
    print_info(&format!(
        "Total: {}  Success: {}  Failed: {}  Skipped: {}",
        report.total, report.success, report.failed, report.skipped
    ));
    print_info(&format!(
        "Success rate: {:.1}%  Duration: {:.1}s",
        report.success_rate, report.duration_seconds
    ));

    if !report.results.failed.is_empty() {
        print_error("Failed BSPs:");
        for result in &report.results.failed {
            let log = result.log_file.as_deref().unwrap_or("-");
            print_detail(&format!("{} (log: {log})", result.target));
        }
    }

    for result in report.restore_failures() {
        print_error(&format!(
            "{}: {}",
            result.target,
            result.restore_error.as_deref().unwrap_or_default()
        ));
    }

    if report.exit_code() == 0 {
        print_success("All BSPs built successfully");
    }
}
