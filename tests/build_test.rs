//! Integration tests for target orchestration
//!
//! Runs the orchestrator and state machine over scratch BSP trees with a
//! scripted command runner in place of the build tools.

mod common;

use std::time::Duration;

use bspcheck::core::machine::BuildState;
use bspcheck::core::orchestrator::Orchestrator;
use bspcheck::core::report::ResultAggregator;
use bspcheck::core::settings::{BuildConfig, Override};
use bspcheck::core::target::{select_targets, TargetStatus};
use bspcheck::error::RunError;
use bspcheck::infra::process::CommandOutput;
use common::{timeout, Reply, ScriptedRunner, Step, TestProject, BASE_KCONFIG};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn config_with_override(targets: &[&str]) -> BuildConfig {
    BuildConfig {
        test_bsps: names(targets),
        temp_kconfig_options: vec![Override::new("CONFIG_RT_USING_I2C", "y")],
        ..BuildConfig::default()
    }
}

#[tokio::test]
async fn test_compile_timeout_fails_only_that_target() {
    let project = TestProject::new();
    for name in ["board-a", "board-b", "board-c"] {
        project.create_target(name, BASE_KCONFIG);
    }
    let config = config_with_override(&["board-a", "board-b", "board-c"]);
    let runner = ScriptedRunner::new().on("board-b", Step::Compile, Reply::Error(timeout("scons", 600)));

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &config.excluded_bsps);
    let mut aggregator = ResultAggregator::new();
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();
    aggregator.extend(results);
    let report = aggregator.finish(&config);

    let success: Vec<&str> = report.results.success.iter().map(|r| r.target.as_str()).collect();
    let failed: Vec<&str> = report.results.failed.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(success, vec!["board-a", "board-c"]);
    assert_eq!(failed, vec!["board-b"]);
    assert!((report.success_rate - 66.7).abs() < 0.05);
    assert_eq!(report.exit_code(), 1);

    let log = project.read_file("build_logs/board-b.log");
    assert!(log.contains("TIMEOUT: compile exceeded 600s"));
    assert!(log.contains("=== Restore ==="));
    assert!(log.contains("Restored"));

    for name in ["board-a", "board-b", "board-c"] {
        assert_eq!(project.read_file(&format!("bsp/{name}/.config")), BASE_KCONFIG);
        assert!(!project.file_exists(&format!("bsp/{name}/.config.bak")));
        assert!(project.file_exists(&format!("build_logs/{name}.log")));
    }
}

#[tokio::test]
async fn test_override_active_during_compile_and_reverted_after() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    let config = config_with_override(&["board-a"]);
    let runner = ScriptedRunner::new();

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert!(results[0].success);
    let compile = runner
        .calls()
        .into_iter()
        .find(|c| c.step == Step::Compile)
        .unwrap();
    assert!(compile.kconfig.unwrap().contains("CONFIG_RT_USING_I2C=y\n"));
    assert_eq!(
        runner.steps_for("board-a"),
        vec![Step::Configure, Step::Configure, Step::Compile]
    );
    assert_eq!(project.read_file("bsp/board-a/.config"), BASE_KCONFIG);
    assert_eq!(
        project.read_file("bsp/board-a/rtconfig.h"),
        "#define RT_NAME_MAX 8\n"
    );
}

#[tokio::test]
async fn test_missing_package_updates_before_compile() {
    let project = TestProject::new();
    project.create_target(
        "board-a",
        "CONFIG_RT_USING_SERIAL=y\nCONFIG_PKG_USING_X_Y=y\nCONFIG_PKG_USING_X_Y_LATEST_VERSION=y\n",
    );
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on(
        "board-a",
        Step::PackageUpdate,
        Reply::Packages(vec![("x_y-latest".to_string(), "x_y.c".to_string())]),
    );

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert_eq!(
        runner.steps_for("board-a"),
        vec![Step::Configure, Step::PackageUpdate, Step::Compile]
    );
    let result = &results[0];
    assert!(result.success);
    assert!(result.warnings.is_empty());
    assert!(result.log.contains("Missing: x-y"));
    assert!(result.log.contains("Downloaded: x_y-latest"));
}

#[tokio::test]
async fn test_failed_package_update_still_compiles() {
    let project = TestProject::new();
    project.create_target("board-a", "CONFIG_PKG_USING_CJSON=y\n");
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on(
        "board-a",
        Step::PackageUpdate,
        Reply::Output(CommandOutput::with_code(1, "", "error: cannot reach mirror")),
    );

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert!(results[0].success);
    assert_eq!(results[0].warnings.len(), 1);
    assert!(results[0].warnings[0].contains("non-zero exit code: 1"));
    assert!(runner.steps_for("board-a").contains(&Step::Compile));
}

#[tokio::test]
async fn test_package_update_timeout_fails_target() {
    let project = TestProject::new();
    project.create_target("board-a", "CONFIG_PKG_USING_CJSON=y\n");
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on(
        "board-a",
        Step::PackageUpdate,
        Reply::Error(timeout("pkgs", 300)),
    );

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert_eq!(results[0].status, TargetStatus::Failed);
    assert!(results[0].timed_out);
    assert!(!runner.steps_for("board-a").contains(&Step::Compile));
}

#[tokio::test]
async fn test_package_manager_start_failure_fails_target() {
    let project = TestProject::new();
    project.create_target("board-a", "CONFIG_PKG_USING_CJSON=y\n");
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on(
        "board-a",
        Step::PackageUpdate,
        Reply::Error(RunError::Spawn {
            program: "pkgs".to_string(),
            error: "Permission denied".to_string(),
        }),
    );

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    let result = &results[0];
    assert_eq!(result.status, TargetStatus::Failed);
    assert!(!result.timed_out);
    assert!(result.failure.as_deref().unwrap().contains("Permission denied"));
    assert_eq!(
        runner.steps_for("board-a"),
        vec![Step::Configure, Step::PackageUpdate]
    );
    assert_eq!(
        result.states,
        vec![
            BuildState::Init,
            BuildState::Configure,
            BuildState::PackageCheck,
            BuildState::PackageUpdate,
            BuildState::Restore,
            BuildState::Failed
        ]
    );
}

#[tokio::test]
async fn test_failed_restore_fails_target_and_is_reported() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    let config = config_with_override(&["board-a"]);
    let runner = ScriptedRunner::new().on(
        "board-a",
        Step::Compile,
        Reply::Delete(".config.bak".to_string()),
    );

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    let result = &results[0];
    assert!(result.artifacts.contains_key("rtthread.bin"));
    assert_eq!(result.status, TargetStatus::Failed);
    assert!(!result.success);
    assert!(result
        .restore_error
        .as_deref()
        .unwrap()
        .contains(".config.bak is missing"));
    assert!(project.read_file("build_logs/board-a.log").contains("ERROR: Failed to restore"));

    let mut aggregator = ResultAggregator::new();
    aggregator.extend(results);
    let report = aggregator.finish(&config);
    let restore_failures: Vec<&str> = report
        .restore_failures()
        .map(|r| r.target.as_str())
        .collect();
    assert_eq!(restore_failures, vec!["board-a"]);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_zero_exit_compile_without_artifact_fails() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on("board-a", Step::Compile, Reply::Nothing);

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert_eq!(results[0].status, TargetStatus::Failed);
    assert!(results[0].artifacts.is_empty());
    assert_eq!(results[0].states.last(), Some(&BuildState::Failed));
}

#[tokio::test]
async fn test_every_target_reaches_one_terminal_status() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    project.create_target("board-c", BASE_KCONFIG);
    project.create_target("board-d", BASE_KCONFIG);
    let config = BuildConfig {
        test_bsps: names(&["board-a", "board-b", "board-c", "board-d"]),
        excluded_bsps: names(&["board-d"]),
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new().on("board-c", Step::Compile, Reply::Nothing);

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &config.excluded_bsps);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    let statuses: Vec<(&str, TargetStatus)> = targets
        .iter()
        .map(|t| (t.name.as_str(), t.status()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("board-a", TargetStatus::Success),
            ("board-b", TargetStatus::Skipped),
            ("board-c", TargetStatus::Failed),
        ]
    );
    assert_eq!(results.len(), 3);
    assert!(results.iter().zip(&targets).all(|(r, t)| r.status == t.status()));
    assert!(runner.steps_for("board-d").is_empty());
    assert!(!project.file_exists("build_logs/board-b.log"));
}

#[tokio::test]
async fn test_cancelled_build_restores_configuration() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    let config = config_with_override(&["board-a"]);
    let runner = ScriptedRunner::new().on("board-a", Step::Compile, Reply::Hang);

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let orchestrator = Orchestrator::new(&runner, &config, &project.log_dir());
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        orchestrator.run(&mut targets, &()),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(project.read_file("bsp/board-a/.config"), BASE_KCONFIG);
    assert!(!project.file_exists("bsp/board-a/.config.bak"));
}

#[tokio::test]
async fn test_clean_build_runs_clean_first() {
    let project = TestProject::new();
    project.create_target("board-a", BASE_KCONFIG);
    project.create_file("bsp/board-a/build/kernel/clock.o", "obj");
    project.create_file("bsp/board-a/rtthread.elf", "old");
    let config = BuildConfig {
        test_bsps: names(&["board-a"]),
        clean_build: true,
        ..BuildConfig::default()
    };
    let runner = ScriptedRunner::new();

    let mut targets = select_targets(&project.bsp_dir(), &config.test_bsps, &[]);
    let results = Orchestrator::new(&runner, &config, &project.log_dir())
        .run(&mut targets, &())
        .await
        .unwrap();

    assert_eq!(
        runner.steps_for("board-a"),
        vec![Step::Clean, Step::Configure, Step::Compile]
    );
    assert!(!project.file_exists("bsp/board-a/build"));
    assert!(project.file_exists("bsp/board-a/applications/main.c"));
    // the stale image was removed before compiling
    assert!(!results[0].artifacts.contains_key("rtthread.elf"));
    assert!(results[0].artifacts.contains_key("rtthread.bin"));
}
