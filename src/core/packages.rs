//! Package requirement resolution
//!
//! Decides whether a target needs its packages fetched before compiling.
//! Requirements come from `CONFIG_PKG_USING_<NAME>=y` lines in the target's
//! Kconfig selection; they are reconciled against the package directories
//! that already exist under `packages/`.
//!
//! Directory names rarely equal the requirement exactly: the package manager
//! uses hyphens where Kconfig uses underscores and usually appends a version
//! such as `-latest`. Matching therefore runs in two passes, exact on
//! delimiter-normalized names, then [`fuzzy_match`].

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{FilesystemError, PackageResolutionError};
use crate::infra::filesystem;
use crate::infra::process::CommandOutput;

/// File extensions that make a package directory usable
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "h", "cpp", "cc", "cxx", "hpp", "s", "S"];

/// Tokens of the shorter name allowed to be absent from the longer one
pub const MAX_UNMATCHED_TOKENS: usize = 1;

/// Words in package-manager output that indicate a failed fetch
const ERROR_INDICATORS: &[&str] = &["error", "failed", "cannot", "not found", "timeout"];

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*CONFIG_PKG_USING_([A-Z0-9_]+?)(?:_LATEST_VERSION|_EXAMPLE|_SAMPLE)?=y\s*$",
        )
        .expect("Invalid package marker regex")
    })
}

/// Lower-case a name and use hyphens as the only delimiter
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// Split a name into its hyphen/underscore separated tokens
pub fn tokens(name: &str) -> Vec<String> {
    normalize_name(name)
        .split('-')
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// A package the target's configuration enables
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageRequirement {
    /// Lower-case, hyphen-delimited name
    pub canonical: String,
    /// Accepted spellings of the directory name
    pub variants: BTreeSet<String>,
}

impl PackageRequirement {
    /// Build a requirement from the Kconfig symbol suffix, e.g. `AT24CXX`
    pub fn from_symbol(symbol: &str) -> Self {
        let canonical = normalize_name(symbol);
        let variants = [
            canonical.clone(),
            canonical.replace('-', "_"),
            symbol.to_lowercase(),
        ]
        .into_iter()
        .collect();
        Self {
            canonical,
            variants,
        }
    }

    /// Whether `dir_name` is one of the accepted spellings
    pub fn matches_exactly(&self, dir_name: &str) -> bool {
        let lower = dir_name.to_lowercase();
        self.variants.contains(&lower) || normalize_name(dir_name) == self.canonical
    }
}

/// Extract the enabled packages from Kconfig text
pub fn extract_requirements(config_text: &str) -> BTreeSet<PackageRequirement> {
    marker_regex()
        .captures_iter(config_text)
        .filter_map(|caps| caps.get(1))
        .map(|m| PackageRequirement::from_symbol(m.as_str()))
        .collect()
}

/// Fuzzy reconciliation of a required name with an existing directory name
///
/// Accepted when one normalized name is a prefix of the other and the
/// shorter name shares all but at most [`MAX_UNMATCHED_TOKENS`] of its
/// tokens with the longer name. At least one token must be shared, so a
/// short name never matches on a partial token alone.
pub fn fuzzy_match(required: &str, existing: &str) -> bool {
    let required_norm = normalize_name(required);
    let existing_norm = normalize_name(existing);
    if required_norm.is_empty() || existing_norm.is_empty() {
        return false;
    }
    if !existing_norm.starts_with(&required_norm) && !required_norm.starts_with(&existing_norm) {
        return false;
    }

    let required_tokens: BTreeSet<String> = tokens(&required_norm).into_iter().collect();
    let existing_tokens: BTreeSet<String> = tokens(&existing_norm).into_iter().collect();
    let shorter = required_tokens.len().min(existing_tokens.len());
    let common = required_tokens.intersection(&existing_tokens).count();

    common >= 1 && common + MAX_UNMATCHED_TOKENS >= shorter
}

/// Whether a directory holds at least one source or header file
pub fn is_valid_package_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
}

/// Package directories present for a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInventory {
    /// Whether the package directory exists at all
    pub exists: bool,
    /// Names of the directories that pass content validation
    pub valid: BTreeSet<String>,
}

impl PackageInventory {
    /// Inventory for a target that has no package directory yet
    pub fn absent() -> Self {
        Self::default()
    }

    /// Inventory from already-validated directory names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exists: true,
            valid: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan a package directory, keeping only directories with sources
    pub fn scan(packages_dir: &Path) -> Result<Self, FilesystemError> {
        if !packages_dir.is_dir() {
            return Ok(Self::absent());
        }
        let valid = filesystem::subdirectory_names(packages_dir)?
            .into_iter()
            .filter(|name| is_valid_package_dir(&packages_dir.join(name)))
            .collect();
        Ok(Self {
            exists: true,
            valid,
        })
    }
}

/// Outcome of a package check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Whether the package manager must run
    pub needs_update: bool,
    /// Canonical names of the required packages
    pub required: BTreeSet<String>,
    /// Existing directories that pass validation
    pub valid_existing: BTreeSet<String>,
    /// Requirements no directory satisfies
    pub missing: BTreeSet<String>,
}

/// Reconcile the requirements in `config_text` against `inventory`
pub fn resolve(config_text: &str, inventory: &PackageInventory) -> Resolution {
    let requirements = extract_requirements(config_text);
    if requirements.is_empty() {
        return Resolution::default();
    }

    let required: BTreeSet<String> = requirements
        .iter()
        .map(|req| req.canonical.clone())
        .collect();

    if !inventory.exists || inventory.valid.is_empty() {
        return Resolution {
            needs_update: true,
            missing: required.clone(),
            required,
            valid_existing: inventory.valid.clone(),
        };
    }

    let missing: BTreeSet<String> = requirements
        .iter()
        .filter(|req| {
            let exact = inventory.valid.iter().any(|dir| req.matches_exactly(dir));
            let fuzzy = || {
                inventory
                    .valid
                    .iter()
                    .any(|dir| fuzzy_match(&req.canonical, dir))
            };
            !(exact || fuzzy())
        })
        .map(|req| req.canonical.clone())
        .collect();

    Resolution {
        needs_update: !missing.is_empty(),
        required,
        valid_existing: inventory.valid.clone(),
        missing,
    }
}

/// Packages found after a successful update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Directories that did not exist before the update
    pub added: BTreeSet<String>,
    /// All directories after the update
    pub present: BTreeSet<String>,
}

/// Check that a package update actually produced usable packages
///
/// `before` lists the package directories that existed before the update.
pub fn verify_update(
    packages_dir: &Path,
    before: &BTreeSet<String>,
    output: &CommandOutput,
) -> Result<UpdateSummary, PackageResolutionError> {
    match output.code {
        Some(0) => {}
        Some(code) => return Err(PackageResolutionError::ExitCode { code }),
        None => return Err(PackageResolutionError::Terminated),
    }

    if !packages_dir.is_dir() {
        return Err(PackageResolutionError::DirectoryMissing);
    }

    let present: BTreeSet<String> = filesystem::subdirectory_names(packages_dir)
        .map_err(|_| PackageResolutionError::DirectoryMissing)?
        .into_iter()
        .collect();
    if present.is_empty() {
        return Err(PackageResolutionError::DirectoryEmpty);
    }

    let combined = format!("{}{}", output.stdout, output.stderr).to_lowercase();
    let reported_error = ERROR_INDICATORS
        .iter()
        .any(|indicator| combined.contains(indicator));
    if reported_error && present.len() == before.len() {
        return Err(PackageResolutionError::ReportedErrors);
    }

    if !present
        .iter()
        .any(|name| is_valid_package_dir(&packages_dir.join(name)))
    {
        return Err(PackageResolutionError::NoValidPackages);
    }

    Ok(UpdateSummary {
        added: present.difference(before).cloned().collect(),
        present,
    })
}
