// SPDX-License-Identifier: MIT

//! Single-instance lock.
//!
//! The original probes a PID file with `os.kill(pid, 0)`, which races if
//! the PID is reused between the check and the new process starting. This
//! port holds an OS-advisory exclusive lock on the file for the life of
//! the process instead — the lock is released automatically on exit
//! (clean or crashed), closing that window without needing any liveness
//! heuristic at all.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another instance is already running (lock held at {path})")]
    AlreadyRunning { path: String },
    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write pid to lock file {path}: {source}")]
    WritePid {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An exclusive hold on the single-instance lock file. Dropping it
/// releases the OS lock; the file itself is left in place with this
/// process's pid recorded, harmless since the advisory lock — not the
/// file's existence — is what excludes a second instance.
pub struct SingleInstanceLock {
    _file: File,
    path: PathBuf,
}

impl SingleInstanceLock {
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.display().to_string(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| LockError::AlreadyRunning {
                path: path.display().to_string(),
            })?;

        let mut file = file;
        file.set_len(0).map_err(|source| LockError::WritePid {
            path: path.display().to_string(),
            source,
        })?;
        writeln!(file, "{}", std::process::id()).map_err(|source| LockError::WritePid {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
