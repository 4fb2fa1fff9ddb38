//! CLI command for `bspcheck verify-paths`

use std::path::Path;

use anyhow::Result;

use crate::cli::output::{print_detail, print_error, print_info, print_success, status};
use crate::config::defaults::TARGET_LIST_VAR;
use crate::core::ci::{self, PathProblem};

/// Execute the verify-paths command
pub fn execute(root: &Path, bsps: Option<&str>) -> Result<i32> {
    let entries = ci::require_target_list(bsps, TARGET_LIST_VAR)?;

    print_info(&format!("Root: {}", root.display()));
    print_info(&format!("BSPs to verify: {}", entries.len()));

    let (checks, verdict) = ci::verify_paths(root, &entries);
    let total = checks.len();

    for (index, check) in checks.iter().enumerate() {
        println!("[{}/{total}] {}", index + 1, check.entry);
        match check.problem {
            Some(PathProblem::Missing) => {
                print_detail(&format!("{} Directory not found: {}", status::ERROR, check.path.display()));
            }
            Some(PathProblem::NotADirectory) => {
                print_detail(&format!("{} Not a directory: {}", status::ERROR, check.path.display()));
            }
            None => {
                let mark = |present: bool| if present { status::SUCCESS } else { status::ERROR };
                print_detail(&format!("{} {}", status::SUCCESS, check.path.display()));
                print_detail(&format!("Kconfig: {}", mark(check.has_kconfig)));
                print_detail(&format!("SConstruct: {}", mark(check.has_sconstruct)));
                if let Some(count) = check.file_count {
                    print_detail(&format!("Entries: {count}"));
                }
            }
        }
    }

    match verdict {
        Ok(()) => {
            print_success("All BSP paths verified");
            Ok(0)
        }
        Err(e) => {
            print_error(&e.to_string());
            print_detail("Check that the BSP directories are committed and checked out,");
            print_detail("and that the paths in the configuration are correct.");
            Ok(1)
        }
    }
}
