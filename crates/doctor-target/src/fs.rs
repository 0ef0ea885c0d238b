//! Host path preparation and permission repair.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ops::PathRepair;
use crate::Result;

/// Apply a [`PathRepair`]: backups first, then directories, then files, then modes.
///
/// Blocking; async callers run it on the blocking pool.
pub fn apply_path_repair(repair: &PathRepair) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
    for path in &repair.backup {
        back_up(path, &stamp)?;
    }

    for dir in &repair.dirs {
        std::fs::create_dir_all(dir)?;
        debug!(path = %dir.display(), "Directory ready");
    }

    for file in &repair.files {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)?;
        debug!(path = %file.display(), "File ready");
    }

    if let Some(mode) = repair.mode {
        for path in repair.dirs.iter().chain(repair.files.iter()) {
            if repair.recursive && path.is_dir() {
                chmod_recursive(path, mode)?;
            } else {
                chmod(path, mode)?;
            }
        }
    }

    Ok(())
}

/// Rename `path` to `<name>.bak-<stamp>` next to it.
fn back_up(path: &Path, stamp: &str) -> Result<Option<PathBuf>> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".bak-{}", stamp));
    let target = path.with_file_name(name);

    match std::fs::rename(path, &target) {
        Ok(()) => {
            info!(from = %path.display(), to = %target.display(), "Moved file aside");
            Ok(Some(target))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn chmod_recursive(dir: &Path, mode: u32) -> Result<()> {
    chmod(dir, mode)?;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            chmod_recursive(&path, mode)?;
        } else {
            chmod(&path, mode)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn chmod(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn chmod(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
