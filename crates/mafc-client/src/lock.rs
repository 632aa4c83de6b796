//! Advisory exclusive lock on a `.mrkl` file: enforces that the state
//! file is owned by exactly one `MaFileChannel` at a time.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt as _;

use crate::error::{Error, Result};

/// Holds an advisory exclusive lock on `path` for the lifetime of the
/// value; the lock is released on drop.
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Attempts to take the lock, failing with [`Error::Locked`] if
    /// another process already holds it (two concurrent processes on the
    /// same cache are not supported).
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|_| {
            Error::Locked(format!("{} is held by another process", path.display()))
        })?;
        Ok(Self { file, path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release state lock");
        }
    }
}
