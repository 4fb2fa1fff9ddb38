//! Cleanup-only mode (`--cleanup-all`)

use crate::cli::output::{print_detail, print_error, print_info, print_success, print_warning};
use crate::core::clean::cleanup_targets;
use crate::core::target::Target;

/// Clean every target and print what happened; returns the exit code
pub fn execute(targets: &[Target]) -> i32 {
    print_info(&format!("Cleaning {} BSP(s)", targets.len()));

    let reports = cleanup_targets(targets);
    let mut failed = 0;

    for report in &reports {
        if report.missing {
            print_error(&format!("{}: directory not found", report.target));
            failed += 1;
        } else if report.failures.is_empty() {
            print_success(&format!(
                "{}: removed {} item(s)",
                report.target,
                report.removed.len()
            ));
        } else {
            print_warning(&format!(
                "{}: removed {} item(s), {} failed",
                report.target,
                report.removed.len(),
                report.failures.len()
            ));
            for failure in &report.failures {
                print_detail(&failure.to_string());
            }
            failed += 1;
        }
    }

    if failed == 0 {
        print_success("Cleanup complete");
        0
    } else {
        print_error(&format!("{failed} BSP(s) could not be fully cleaned"));
        1
    }
}
