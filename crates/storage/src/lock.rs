// SPDX-License-Identifier: MIT

//! Advisory single-worker-per-host lock, held for the lifetime of the
//! worker process so a second invocation on the same host cannot run a
//! concurrent writer against the same queue and state files.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("another process already holds the worker lock at {0}")]
    AlreadyHeld(String),
}

/// An exclusive advisory lock, released when dropped.
pub struct WorkerLock {
    file: File,
}

impl WorkerLock {
    /// Try to acquire the lock at `path`, creating the file if needed.
    /// Returns [`LockError::AlreadyHeld`] immediately if another process
    /// holds it — this is a non-blocking check, not a wait.
    pub fn try_acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| LockError::AlreadyHeld(path.display().to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for WorkerLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
