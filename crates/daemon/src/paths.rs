// SPDX-License-Identifier: MIT

//! Filesystem layout the daemon owns: watched/output directories, the
//! single-instance lock file, and the tracking file, all rooted under one
//! pipeline root directory.

use std::path::{Path, PathBuf};

use dnd_core::Config;
use dnd_storage::TRACKING_FILENAME;

const LOCK_FILENAME: &str = "dnd_runner.lock";
const WRITE_PROBE_FILENAME: &str = ".write_test";

#[derive(Debug, Clone)]
pub struct RunnerPaths {
    pub root: PathBuf,
    pub watched_dir: PathBuf,
    pub output_dir: PathBuf,
    pub lock_path: PathBuf,
    pub tracking_path: PathBuf,
    pub log_dir: PathBuf,
}

impl RunnerPaths {
    pub fn new(root: PathBuf, config: &Config) -> Self {
        let watched_dir = resolve(&root, &config.watched_dir);
        let output_dir = resolve(&root, &config.output_dir);
        let log_dir = resolve(&root, &config.logging.log_dir);
        let tracking_path = watched_dir.join(TRACKING_FILENAME);
        let lock_path = root.join(LOCK_FILENAME);

        Self {
            root,
            watched_dir,
            output_dir,
            lock_path,
            tracking_path,
            log_dir,
        }
    }

    /// Create the watched/output/log directories if missing and verify
    /// the watched directory is actually writable, via a throwaway probe
    /// file (mirrors the original's `.write_test` check).
    pub fn ensure_writable(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.watched_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;

        let probe = self.watched_dir.join(WRITE_PROBE_FILENAME);
        std::fs::write(&probe, b"test")?;
        std::fs::remove_file(&probe)?;
        Ok(())
    }
}

fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
