// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;

/// Resolve the pipeline root: `DND_VISUALIZER_ROOT` if set, else the
/// daemon's current working directory. Everything else (watched/output
/// directories, config file, lock file, logs) is rooted under this path
/// unless the config file overrides a directory with an absolute path.
pub fn root_dir() -> PathBuf {
    std::env::var("DND_VISUALIZER_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Path to the TOML config file, relative to `root`.
pub fn config_path(root: &std::path::Path) -> PathBuf {
    std::env::var("DND_VISUALIZER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| root.join("config.toml"))
}
