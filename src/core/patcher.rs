//! Temporary Kconfig overrides
//!
//! [`apply`] copies the target's configuration artifacts to `<name>.bak`,
//! then rewrites `.config` with the requested overrides. The returned
//! [`ConfigBackup`] guard owns the backups: [`ConfigBackup::restore`] moves
//! them back and reports failures, and dropping an unrestored guard restores
//! as well, so an error, a timeout or a cancelled build never leaves the
//! patched configuration behind.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::{BACKUP_SUFFIX, GENERATED_HEADER, KCONFIG_FILE};
use crate::core::settings::Override;
use crate::error::{ConfigRestoreError, PatchError};

/// Configuration artifacts saved before patching
pub const PATCHED_FILES: &[&str] = &[KCONFIG_FILE, GENERATED_HEADER];

/// Sibling backup location of `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

#[derive(Debug)]
struct BackupEntry {
    original: PathBuf,
    backup: PathBuf,
}

/// Scoped hold on the original configuration of one target
#[derive(Debug)]
#[must_use = "dropping the guard restores the original configuration immediately"]
pub struct ConfigBackup {
    entries: Vec<BackupEntry>,
    restored: bool,
}

impl ConfigBackup {
    /// Copy every existing configuration artifact of `target_dir`
    pub fn take(target_dir: &Path) -> Result<Self, PatchError> {
        let mut guard = Self {
            entries: Vec::new(),
            restored: false,
        };

        for name in PATCHED_FILES {
            let original = target_dir.join(name);
            if !original.is_file() {
                continue;
            }
            let backup = backup_path(&original);
            // A failure here drops `guard`, which puts back what was copied so far
            fs::copy(&original, &backup).map_err(|e| PatchError::Backup {
                path: original.clone(),
                error: e.to_string(),
            })?;
            guard.entries.push(BackupEntry { original, backup });
        }

        Ok(guard)
    }

    /// Files held by this backup
    pub fn files(&self) -> Vec<&Path> {
        self.entries.iter().map(|e| e.original.as_path()).collect()
    }

    /// Move every backup back over its working file
    ///
    /// All entries are attempted; the first failure is returned.
    pub fn restore(mut self) -> Result<Vec<PathBuf>, ConfigRestoreError> {
        self.restored = true;
        self.restore_entries()
    }

    fn restore_entries(&self) -> Result<Vec<PathBuf>, ConfigRestoreError> {
        let mut first_error = None;
        let mut restored = Vec::new();

        for entry in &self.entries {
            match move_back(entry) {
                Ok(()) => restored.push(entry.original.clone()),
                Err(e) => {
                    tracing::error!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(restored),
        }
    }
}

impl Drop for ConfigBackup {
    fn drop(&mut self) {
        if self.restored || self.entries.is_empty() {
            return;
        }
        if self.restore_entries().is_ok() {
            tracing::warn!(
                "Restored original configuration after an interrupted attempt: {}",
                self.entries
                    .iter()
                    .map(|e| e.original.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

fn move_back(entry: &BackupEntry) -> Result<(), ConfigRestoreError> {
    let fail = |error: String| ConfigRestoreError {
        path: entry.original.clone(),
        error,
    };

    if !entry.backup.is_file() {
        return Err(fail(format!("backup {} is missing", entry.backup.display())));
    }
    if fs::rename(&entry.backup, &entry.original).is_ok() {
        return Ok(());
    }
    fs::copy(&entry.backup, &entry.original).map_err(|e| fail(e.to_string()))?;
    fs::remove_file(&entry.backup).map_err(|e| fail(e.to_string()))
}

/// Back up the configuration of `target_dir` and apply `overrides` to `.config`
pub fn apply(target_dir: &Path, overrides: &[Override]) -> Result<ConfigBackup, PatchError> {
    let config_path = target_dir.join(KCONFIG_FILE);
    if !config_path.is_file() {
        return Err(PatchError::ConfigMissing { path: config_path });
    }

    let guard = ConfigBackup::take(target_dir)?;

    let rewrite_error = |e: std::io::Error| PatchError::Rewrite {
        path: config_path.clone(),
        error: e.to_string(),
    };
    let original = fs::read_to_string(&config_path).map_err(rewrite_error)?;
    fs::write(&config_path, patch_kconfig(&original, overrides)).map_err(rewrite_error)?;

    Ok(guard)
}

/// Rewrite Kconfig text with the given overrides
///
/// - `# KEY is not set` becomes `KEY=y` when the override enables the option
/// - `KEY=...` takes the override value
/// - keys with no matching line are appended
///
/// For repeated keys the last value wins.
pub fn patch_kconfig(text: &str, overrides: &[Override]) -> String {
    let mut effective: Vec<&Override> = Vec::new();
    for o in overrides {
        match effective.iter_mut().find(|slot| slot.key == o.key) {
            Some(slot) => *slot = o,
            None => effective.push(o),
        }
    }

    let mut handled: HashSet<&str> = HashSet::new();
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let stripped = line.trim();
        let mut replacement = None;

        for o in &effective {
            let (key, value) = (o.key.as_str(), o.value.as_str());
            if stripped == format!("# {key} is not set") {
                if o.enables() {
                    replacement = Some(format!("{key}=y\n"));
                } else if value.eq_ignore_ascii_case("n") {
                    // already disabled
                    handled.insert(key);
                }
                if replacement.is_some() {
                    handled.insert(key);
                }
                break;
            }
            if stripped.starts_with(&format!("{key}=")) {
                replacement = Some(format!("{key}={value}\n"));
                handled.insert(key);
                break;
            }
        }

        match replacement {
            Some(new_line) => out.push_str(&new_line),
            None => out.push_str(line),
        }
    }

    for o in &effective {
        let (key, value) = (o.key.as_str(), o.value.as_str());
        if !handled.contains(key) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("{key}={value}\n"));
        }
    }

    out
}
