//! Default configuration values

/// Default number of parallel build jobs
pub const DEFAULT_BUILD_JOBS: usize = 4;

/// Timeout for the build driver's clean command (in seconds)
pub const CLEAN_TIMEOUT_SECS: u64 = 60;

/// Timeout for (re)generating derived configuration (in seconds)
pub const CONFIGURE_TIMEOUT_SECS: u64 = 60;

/// Timeout for fetching packages (in seconds)
pub const PACKAGE_UPDATE_TIMEOUT_SECS: u64 = 300;

/// Timeout for compiling a target (in seconds)
pub const COMPILE_TIMEOUT_SECS: u64 = 600;

/// Timeout for `--version` probes during the environment check (in seconds)
pub const TOOL_PROBE_TIMEOUT_SECS: u64 = 10;

/// Build driver executable
pub const BUILD_DRIVER: &str = "scons";

/// Cross compiler executable
pub const COMPILER: &str = "arm-none-eabi-gcc";

/// Package manager executable
pub const PACKAGE_MANAGER: &str = "pkgs";

/// Persisted Kconfig selection of a target
pub const KCONFIG_FILE: &str = ".config";

/// Header generated from the Kconfig selection
pub const GENERATED_HEADER: &str = "rtconfig.h";

/// Suffix appended to backed-up configuration files
pub const BACKUP_SUFFIX: &str = ".bak";

/// Build output directory inside a target
pub const BUILD_DIR: &str = "build";

/// Package materialization directory inside a target
pub const PACKAGES_DIR: &str = "packages";

/// File stem of the firmware image
pub const ARTIFACT_STEM: &str = "rtthread";

/// Artifact extensions whose presence marks a successful build
pub const SUCCESS_ARTIFACT_EXTENSIONS: &[&str] = &["bin", "elf"];

/// Artifact extensions whose sizes are recorded
pub const SIZED_ARTIFACT_EXTENSIONS: &[&str] = &["bin", "elf", "hex", "map"];

/// Output file extensions removed by a pre-build clean
pub const CLEAN_OUTPUT_EXTENSIONS: &[&str] = &["bin", "elf", "hex", "map", "axf", "lib", "a"];

/// Firmware image extensions removed by the cleanup engine
pub const CLEANUP_IMAGE_EXTENSIONS: &[&str] = &["bin", "elf", "hex", "map", "axf", "lst", "asm"];

/// Intermediate file extensions removed by the cleanup engine
pub const CLEANUP_OBJECT_EXTENSIONS: &[&str] = &["o", "obj", "d", "dep", "a", "lib"];

/// Build-system bookkeeping files removed by the cleanup engine
pub const BOOKKEEPING_FILES: &[&str] = &[".sconsign.dblite"];

/// Generated configuration headers removed by the cleanup engine
pub const GENERATED_CONFIG_FILES: &[&str] = &["cconfig.h"];

/// Unified configuration file name
pub const UNIFIED_CONFIG_FILE: &str = "gd32_bsp_config.json";

/// Legacy configuration file name
pub const LEGACY_CONFIG_FILE: &str = "local_build_test.json";

/// Section holding the local build settings in the unified layout
pub const NAMESPACE_KEY: &str = "local_test";

/// BSP family directory relative to the RT-Thread root
pub const BSP_FAMILY_PATH: &[&str] = &["bsp", "gd32", "arm"];

/// Subdirectories of the BSP family directory that are never targets
pub const NON_TARGET_DIRS: &[&str] = &["libraries", "tools", "docs", "scripts"];

/// Build description that marks a directory as a target
pub const TARGET_MARKER: &str = "SConstruct";

/// Default log directory (relative to the working directory)
pub const LOG_DIR: &str = "build_logs";

/// Environment variable listing targets for the CI build collaborator
pub const TARGET_LIST_VAR: &str = "SRTT_BSP";
