//! Run configuration
//!
//! Loads the JSON configuration file in either layout:
//!
//! - legacy: the settings are the top-level object
//! - unified: the settings live under a `local_test` section next to other
//!   tooling sections
//!
//! File values are resolved into an immutable [`BuildConfig`]; flags given
//! on the command line take precedence over the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::defaults::{
    BSP_FAMILY_PATH, BUILD_DRIVER, CLEAN_TIMEOUT_SECS, COMPILER, COMPILE_TIMEOUT_SECS,
    CONFIGURE_TIMEOUT_SECS, DEFAULT_BUILD_JOBS, LEGACY_CONFIG_FILE, NAMESPACE_KEY,
    PACKAGE_MANAGER, PACKAGE_UPDATE_TIMEOUT_SECS, UNIFIED_CONFIG_FILE,
};
use crate::error::ConfigLoadError;

/// How a target is cleaned before a clean build
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum CleanMethod {
    /// The build driver's own clean command
    #[serde(rename = "scons", alias = "tool")]
    #[value(name = "scons", alias = "tool")]
    Tool,
    /// Delete the build output directory
    #[serde(rename = "rmdir", alias = "directory")]
    #[value(name = "rmdir", alias = "directory")]
    DirectoryDelete,
    /// Both of the above
    #[default]
    #[serde(rename = "both")]
    #[value(name = "both")]
    Both,
}

impl CleanMethod {
    /// Whether the build driver's clean command runs
    pub fn uses_tool(self) -> bool {
        matches!(self, Self::Tool | Self::Both)
    }

    /// Whether the build directory is deleted
    pub fn deletes_directory(self) -> bool {
        matches!(self, Self::DirectoryDelete | Self::Both)
    }
}

impl fmt::Display for CleanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tool => "scons",
            Self::DirectoryDelete => "rmdir",
            Self::Both => "both",
        };
        f.write_str(name)
    }
}

/// A temporary Kconfig override, written `KEY=VALUE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Override {
    pub key: String,
    pub value: String,
}

impl Override {
    /// Create an override
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether the override turns the option on
    pub fn enables(&self) -> bool {
        self.value.eq_ignore_ascii_case("y")
    }
}

impl FromStr for Override {
    type Err = ConfigLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigLoadError::InvalidOverride {
            entry: s.to_string(),
        };
        let (key, value) = s.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self::new(key, value.trim()))
    }
}

impl TryFrom<String> for Override {
    type Error = ConfigLoadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Override> for String {
    fn from(value: Override) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Per-step time budgets in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub clean: u64,
    pub configure: u64,
    pub package_update: u64,
    pub compile: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            clean: CLEAN_TIMEOUT_SECS,
            configure: CONFIGURE_TIMEOUT_SECS,
            package_update: PACKAGE_UPDATE_TIMEOUT_SECS,
            compile: COMPILE_TIMEOUT_SECS,
        }
    }
}

/// External tool executables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub build_driver: String,
    pub compiler: String,
    pub package_manager: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            build_driver: BUILD_DRIVER.to_string(),
            compiler: COMPILER.to_string(),
            package_manager: PACKAGE_MANAGER.to_string(),
        }
    }
}

/// Settings as they appear in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileConfig {
    pub test_bsps: Option<Vec<String>>,
    pub excluded_bsps: Option<Vec<String>>,
    pub clean_build: Option<bool>,
    pub clean_method: Option<CleanMethod>,
    pub keep_build_dir: Option<bool>,
    pub temp_kconfig_options: Option<Vec<Override>>,
    pub parallel_jobs: Option<usize>,
    pub timeouts: Option<Timeouts>,
    pub tools: Option<Tools>,
}

/// Deprecation markers found in a configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deprecation {
    /// Migration hint
    pub note: Option<String>,
    /// Successor file
    pub new_file: Option<String>,
}

/// Configuration file contents after layout detection
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// File the settings came from
    pub path: PathBuf,
    /// Whether the unified (namespaced) layout was used
    pub namespaced: bool,
    /// Settings
    pub file: FileConfig,
    /// Deprecation markers, if the file is marked deprecated
    pub deprecation: Option<Deprecation>,
}

/// Read and parse a configuration file
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigLoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    parse_config(&text, path)
}

/// Parse configuration text; `path` is used for error messages
pub fn parse_config(text: &str, path: &Path) -> Result<LoadedConfig, ConfigLoadError> {
    let parse_error = |error: String| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        error,
    };

    let raw: serde_json::Value = serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;
    if !raw.is_object() {
        return Err(parse_error("top-level value must be an object".to_string()));
    }

    let (section, namespaced) = match raw.get(NAMESPACE_KEY) {
        Some(section) => (section.clone(), true),
        None => (raw.clone(), false),
    };

    // Deprecation markers sit at the top level in both layouts
    let deprecation = if raw.get("_deprecated").and_then(serde_json::Value::as_bool) == Some(true) {
        Some(Deprecation {
            note: raw
                .get("_migration_note")
                .and_then(serde_json::Value::as_str)
                .map(String::from),
            new_file: raw
                .get("_new_file")
                .and_then(serde_json::Value::as_str)
                .map(String::from),
        })
    } else {
        None
    };

    let file: FileConfig = serde_json::from_value(section).map_err(|e| parse_error(e.to_string()))?;

    Ok(LoadedConfig {
        path: path.to_path_buf(),
        namespaced,
        file,
        deprecation,
    })
}

/// Find a configuration file when none was given
///
/// Looks for the unified file, then the legacy file in the working
/// directory, then the legacy file in the BSP directory.
pub fn discover_config(cwd: &Path, bsp_dir: &Path) -> Option<PathBuf> {
    [
        cwd.join(UNIFIED_CONFIG_FILE),
        cwd.join(LEGACY_CONFIG_FILE),
        bsp_dir.join(LEGACY_CONFIG_FILE),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

/// Locate the directory holding the BSP targets
///
/// An explicit directory must exist. Otherwise the nearest ancestor of
/// `cwd` containing both `bsp/` and `src/` is taken as the RT-Thread root.
pub fn locate_bsp_dir(cwd: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigLoadError> {
    if let Some(dir) = explicit {
        if dir.is_dir() {
            return Ok(dir.to_path_buf());
        }
        return Err(ConfigLoadError::BspDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let root = find_rtt_root(cwd).ok_or_else(|| ConfigLoadError::RootNotFound {
        start: cwd.to_path_buf(),
    })?;
    Ok(BSP_FAMILY_PATH.iter().fold(root, |path, part| path.join(part)))
}

/// Nearest ancestor (inclusive) containing `bsp/` and `src/`
pub fn find_rtt_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("bsp").is_dir() && dir.join("src").is_dir())
        .map(Path::to_path_buf)
}

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit target subset
    pub targets: Option<Vec<String>>,
    /// Clean build requested
    pub clean_build: Option<bool>,
    /// Clean method
    pub clean_method: Option<CleanMethod>,
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub test_bsps: Vec<String>,
    pub excluded_bsps: Vec<String>,
    pub clean_build: bool,
    pub clean_method: CleanMethod,
    pub keep_build_dir: bool,
    pub temp_kconfig_options: Vec<Override>,
    pub parallel_jobs: usize,
    pub timeouts: Timeouts,
    pub tools: Tools,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            test_bsps: Vec::new(),
            excluded_bsps: Vec::new(),
            clean_build: false,
            clean_method: CleanMethod::default(),
            keep_build_dir: false,
            temp_kconfig_options: Vec::new(),
            parallel_jobs: DEFAULT_BUILD_JOBS,
            timeouts: Timeouts::default(),
            tools: Tools::default(),
        }
    }
}

impl BuildConfig {
    /// Resolve file settings and command-line flags into the effective config
    ///
    /// `detect` supplies the target list when neither the file nor the
    /// command line names one. A parallelism hint of 0 means one job per CPU.
    pub fn resolve(
        file: FileConfig,
        cli: &CliOverrides,
        detect: impl FnOnce() -> Vec<String>,
    ) -> Self {
        let test_bsps = match (&cli.targets, file.test_bsps) {
            (Some(targets), _) => targets.clone(),
            (None, Some(targets)) => targets,
            (None, None) => detect(),
        };

        let parallel_jobs = match file.parallel_jobs {
            Some(0) => num_cpus::get(),
            Some(jobs) => jobs,
            None => DEFAULT_BUILD_JOBS,
        };

        Self {
            test_bsps,
            excluded_bsps: file.excluded_bsps.unwrap_or_default(),
            clean_build: cli.clean_build.or(file.clean_build).unwrap_or(false),
            clean_method: cli.clean_method.or(file.clean_method).unwrap_or_default(),
            keep_build_dir: file.keep_build_dir.unwrap_or(false),
            temp_kconfig_options: file.temp_kconfig_options.unwrap_or_default(),
            parallel_jobs,
            timeouts: file.timeouts.unwrap_or_default(),
            tools: file.tools.unwrap_or_default(),
        }
    }

    /// Whether temporary overrides are configured
    pub fn has_overrides(&self) -> bool {
        !self.temp_kconfig_options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> LoadedConfig {
        parse_config(text, Path::new("test.json")).unwrap()
    }

    #[test]
    fn test_legacy_layout() {
        let loaded = parse(
            r#"{
                "test_bsps": ["gd32f407v-start", "gd32h759i-eval"],
                "excluded_bsps": ["gd32h759i-eval"],
                "clean_build": true,
                "clean_method": "rmdir",
                "temp_kconfig_options": ["CONFIG_RT_USING_I2C=y"],
                "parallel_jobs": 8,
                "toolchain": "sourcery-arm"
            }"#,
        );
        assert!(!loaded.namespaced);
        let file = loaded.file;
        assert_eq!(file.test_bsps.unwrap().len(), 2);
        assert_eq!(file.clean_method, Some(CleanMethod::DirectoryDelete));
        assert_eq!(
            file.temp_kconfig_options.unwrap(),
            vec![Override::new("CONFIG_RT_USING_I2C", "y")]
        );
        assert_eq!(file.parallel_jobs, Some(8));
        assert!(loaded.deprecation.is_none());
    }

    #[test]
    fn test_namespaced_layout_takes_precedence() {
        let loaded = parse(
            r#"{
                "test_bsps": ["outer"],
                "ci": {"matrix": []},
                "local_test": {"test_bsps": ["inner"], "clean_method": "scons"}
            }"#,
        );
        assert!(loaded.namespaced);
        assert_eq!(loaded.file.test_bsps, Some(vec!["inner".to_string()]));
        assert_eq!(loaded.file.clean_method, Some(CleanMethod::Tool));
    }

    #[test]
    fn test_deprecation_markers() {
        let loaded = parse(
            r#"{
                "_deprecated": true,
                "_migration_note": "moved to the unified file",
                "_new_file": "gd32_bsp_config.json",
                "test_bsps": []
            }"#,
        );
        let deprecation = loaded.deprecation.unwrap();
        assert_eq!(deprecation.note.as_deref(), Some("moved to the unified file"));
        assert_eq!(deprecation.new_file.as_deref(), Some("gd32_bsp_config.json"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_config("{ not json", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let err = parse_config(
            r#"{"temp_kconfig_options": ["CONFIG_RT_USING_I2C"]}"#,
            Path::new("bad.json"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
        assert!("=y".parse::<Override>().is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Read { .. }));
    }

    #[test]
    fn test_cli_overrides_win() {
        let file = FileConfig {
            test_bsps: Some(vec!["a".to_string(), "b".to_string()]),
            clean_build: Some(false),
            clean_method: Some(CleanMethod::Tool),
            ..FileConfig::default()
        };
        let cli = CliOverrides {
            targets: Some(vec!["b".to_string()]),
            clean_build: Some(true),
            clean_method: Some(CleanMethod::DirectoryDelete),
        };

        let config = BuildConfig::resolve(file, &cli, Vec::new);
        assert_eq!(config.test_bsps, vec!["b".to_string()]);
        assert!(config.clean_build);
        assert_eq!(config.clean_method, CleanMethod::DirectoryDelete);
    }

    #[test]
    fn test_file_values_used_without_cli_flags() {
        let file = FileConfig {
            clean_build: Some(true),
            keep_build_dir: Some(true),
            ..FileConfig::default()
        };
        let config = BuildConfig::resolve(file, &CliOverrides::default(), || {
            vec!["detected".to_string()]
        });
        assert!(config.clean_build);
        assert!(config.keep_build_dir);
        assert_eq!(config.clean_method, CleanMethod::Both);
        assert_eq!(config.test_bsps, vec!["detected".to_string()]);
        assert_eq!(config.parallel_jobs, DEFAULT_BUILD_JOBS);
        assert_eq!(config.timeouts.compile, 600);
    }

    #[test]
    fn test_zero_jobs_means_auto() {
        let file = FileConfig {
            parallel_jobs: Some(0),
            ..FileConfig::default()
        };
        let config = BuildConfig::resolve(file, &CliOverrides::default(), Vec::new);
        assert!(config.parallel_jobs >= 1);
    }

    #[test]
    fn test_effective_config_serializes_overrides_as_strings() {
        let config = BuildConfig {
            temp_kconfig_options: vec![Override::new("CONFIG_RT_USING_SPI", "y")],
            ..BuildConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["temp_kconfig_options"][0], "CONFIG_RT_USING_SPI=y");
        assert_eq!(json["clean_method"], "both");
    }

    #[test]
    fn test_discover_prefers_unified_file() {
        let cwd = TempDir::new().unwrap();
        let bsp = TempDir::new().unwrap();
        std::fs::write(bsp.path().join(LEGACY_CONFIG_FILE), "{}").unwrap();
        assert_eq!(
            discover_config(cwd.path(), bsp.path()),
            Some(bsp.path().join(LEGACY_CONFIG_FILE))
        );

        std::fs::write(cwd.path().join(UNIFIED_CONFIG_FILE), "{}").unwrap();
        assert_eq!(
            discover_config(cwd.path(), bsp.path()),
            Some(cwd.path().join(UNIFIED_CONFIG_FILE))
        );
    }

    #[test]
    fn test_locate_bsp_dir_from_nested_cwd() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::create_dir_all(root.path().join("bsp/gd32/arm/gd32f407v-start")).unwrap();
        let nested = root.path().join("bsp/gd32/arm/gd32f407v-start");

        let dir = locate_bsp_dir(&nested, None).unwrap();
        assert_eq!(dir, root.path().join("bsp/gd32/arm"));
    }

    #[test]
    fn test_locate_bsp_dir_explicit_missing() {
        let root = TempDir::new().unwrap();
        let err = locate_bsp_dir(root.path(), Some(&root.path().join("nope"))).unwrap_err();
        assert!(matches!(err, ConfigLoadError::BspDirNotFound { .. }));
    }
}
