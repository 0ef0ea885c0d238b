//! Exclusive run lock for one data directory.
//!
//! Two orchestrators remediating the same stack would fight over networks
//! and config files, so a run refuses to start while another holds the lock.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::{DoctorError, Result};

/// Lock file name inside the data directory.
pub const LOCK_FILE: &str = ".deploy-doctor.lock";

/// Held for the lifetime of a run; the file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create `<data_dir>/.deploy-doctor.lock` atomically.
    ///
    /// Fails with [`DoctorError::RunLocked`] if the file already exists.
    /// A stale lock from a crashed run has to be removed by hand.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DoctorError::RunLocked { path });
            }
            Err(e) => return Err(e.into()),
        };

        // From here on drop cleans up, even if the write fails.
        let lock = Self { path };
        writeln!(
            file,
            "pid={}\nacquired_at={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        )?;
        debug!(path = %lock.path.display(), "Run lock acquired");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Run lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove run lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();

        let contents = fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with(&format!("pid={}", std::process::id())));
        assert!(contents.contains("acquired_at="));
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("nested").join("data");
        let lock = RunLock::acquire(&data).unwrap();
        assert!(lock.path().starts_with(&data));
    }
}
