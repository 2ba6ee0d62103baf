// SPDX-License-Identifier: MIT

//! The tracking store: a single JSON document recording the lifecycle
//! state of every scene the pipeline has ever seen.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use dnd_core::record::FileStatus;
use dnd_core::{SceneId, TrackedFileRecord};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// The tracking document's filename, always rooted under the watched
/// directory (`<watched_dir>/transkript_tracking.json`).
pub const TRACKING_FILENAME: &str = "transkript_tracking.json";

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("failed to read tracking file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write tracking file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize tracking state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The whole on-disk tracking document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStoreState {
    pub last_updated: String,
    pub status: String,
    #[serde(default)]
    pub sync_count: u64,
    #[serde(default)]
    pub transcripts: HashMap<String, TrackedFileRecord>,
}

impl Default for TrackingStoreState {
    fn default() -> Self {
        Self {
            last_updated: String::new(),
            status: "initialized".to_string(),
            sync_count: 0,
            transcripts: HashMap::new(),
        }
    }
}

/// One entry from a filesystem scan of the watched directory, as seen by
/// [`TrackingStore::sync_with_scan`].
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub filename: String,
    pub size: u64,
    pub modified: String,
    pub hash: String,
}

/// What `sync_with_scan` decided about one scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Not previously tracked; a complete output pair already exists on
    /// disk, so it's recorded `completed` without being enqueued.
    InsertedComplete,
    /// Not previously tracked and no output exists yet; enqueue.
    InsertedNew,
    /// Tracked with a different content hash; enqueue (unless the prior
    /// status was `completed`, which is also enqueued per the hash-change
    /// always reprocesses rule).
    Modified,
    /// Tracked with an unchanged hash; `last_seen` bumped, nothing else.
    Unchanged,
}

impl SyncAction {
    pub fn should_enqueue(self) -> bool {
        !matches!(self, SyncAction::Unchanged | SyncAction::InsertedComplete)
    }
}

#[derive(Debug, Clone)]
pub struct SyncedFile {
    pub scene_id: SceneId,
    pub action: SyncAction,
}

/// The outcome of one `sync_with_scan` pass: which files changed state
/// and which previously-tracked files disappeared from disk.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub synced: Vec<SyncedFile>,
    pub removed: Vec<SceneId>,
    pub mutated: bool,
}

/// Owns the tracking document and persists it atomically.
pub struct TrackingStore {
    path: PathBuf,
    state: TrackingStoreState,
}

impl TrackingStore {
    /// Load the tracking store from `path`.
    ///
    /// A missing file initializes an empty store in memory (it is written
    /// out on the next `persist`). A file that fails to parse is moved
    /// aside to `<path>.error_backup` and a fresh store is initialized in
    /// its place, so a single corrupted document never blocks the
    /// pipeline from starting.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<TrackingStoreState>(&contents) {
                Ok(state) => state,
                Err(parse_err) => {
                    error!(
                        path = %path.display(),
                        error = %parse_err,
                        "tracking file is corrupt, backing up and reinitializing"
                    );
                    let backup_path = Self::error_backup_path(&path);
                    if let Err(rename_err) = std::fs::rename(&path, &backup_path) {
                        warn!(
                            path = %path.display(),
                            error = %rename_err,
                            "failed to back up corrupt tracking file"
                        );
                    }
                    TrackingStoreState::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => TrackingStoreState::default(),
            Err(source) => {
                return Err(TrackingError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        Ok(Self { path, state })
    }

    fn error_backup_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tracking".to_string());
        name.push_str(".error_backup");
        path.with_file_name(name)
    }

    pub fn snapshot(&self) -> TrackingStoreState {
        self.state.clone()
    }

    pub fn record(&self, scene_id: &SceneId) -> Option<&TrackedFileRecord> {
        self.state.transcripts.get(scene_id.as_str())
    }

    /// Reconcile the current filesystem scan against tracked state in one
    /// pass: insert new records (as `completed` if a complete output pair
    /// already exists, else `new`), mark hash-changed records `modified`
    /// (preserving `previous_status`), bump `last_seen` on unchanged
    /// records, and drop records for files no longer present. Persists
    /// once, only if anything actually changed, and bumps the store-wide
    /// `sync_count` exactly once per mutating pass — not once per file —
    /// matching the "reconcile twice, no-op" idempotence law.
    pub fn sync_with_scan(
        &mut self,
        current: &[ScanEntry],
        already_complete: &HashSet<String>,
        now: &str,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let seen: HashSet<&str> = current.iter().map(|e| e.filename.as_str()).collect();

        for entry in current {
            let existing = self.state.transcripts.get(entry.filename.as_str()).cloned();
            match existing {
                None => {
                    let mut record = TrackedFileRecord::new(
                        entry.filename.clone(),
                        entry.size,
                        entry.modified.clone(),
                        entry.hash.clone(),
                        now.to_string(),
                    );
                    let action = if already_complete.contains(&entry.filename) {
                        record.status = FileStatus::Completed;
                        SyncAction::InsertedComplete
                    } else {
                        SyncAction::InsertedNew
                    };
                    let scene_id = record.scene_id.clone();
                    self.state.transcripts.insert(entry.filename.clone(), record);
                    outcome.synced.push(SyncedFile { scene_id, action });
                    outcome.mutated = true;
                }
                Some(mut record) => {
                    record.last_seen = now.to_string();
                    if record.hash != entry.hash {
                        let previous_status = record.status;
                        record.hash = entry.hash.clone();
                        record.size = entry.size;
                        record.modified = entry.modified.clone();
                        record.modified_at = Some(now.to_string());
                        record.status = FileStatus::Modified;
                        record.previous_status = Some(previous_status);
                        let scene_id = record.scene_id.clone();
                        self.state.transcripts.insert(entry.filename.clone(), record);
                        outcome
                            .synced
                            .push(SyncedFile { scene_id, action: SyncAction::Modified });
                        outcome.mutated = true;
                    } else {
                        let scene_id = record.scene_id.clone();
                        self.state.transcripts.insert(entry.filename.clone(), record);
                        outcome
                            .synced
                            .push(SyncedFile { scene_id, action: SyncAction::Unchanged });
                    }
                }
            }
        }

        let removed_filenames: Vec<String> = self
            .state
            .transcripts
            .keys()
            .filter(|f| !seen.contains(f.as_str()))
            .cloned()
            .collect();
        for filename in removed_filenames {
            if let Some(record) = self.state.transcripts.remove(&filename) {
                outcome.removed.push(record.scene_id);
                outcome.mutated = true;
            }
        }

        if outcome.mutated {
            self.state.sync_count += 1;
            self.state.status = "active".to_string();
            self.state.last_updated = now.to_string();
        }

        outcome
    }

    /// Mark a scene completed, clearing any `previous_status` and error.
    pub fn mark_completed(&mut self, scene_id: &SceneId, now: &str) {
        if let Some(record) = self.state.transcripts.get_mut(scene_id.as_str()) {
            record.status = FileStatus::Completed;
            record.previous_status = None;
            record.last_error = None;
            record.last_seen = now.to_string();
            self.state.sync_count += 1;
            self.state.last_updated = now.to_string();
        }
    }

    /// Mark a scene completed via a fallback mode, attaching an
    /// observability note (e.g. `prompt_only`/`mock`).
    pub fn mark_completed_with_details(&mut self, scene_id: &SceneId, details: &str, now: &str) {
        self.mark_completed(scene_id, now);
        if let Some(record) = self.state.transcripts.get_mut(scene_id.as_str()) {
            record.details = Some(details.to_string());
        }
    }

    /// Mark a scene failed, recording the error message and incrementing
    /// its attempt counter.
    pub fn mark_failed(&mut self, scene_id: &SceneId, error: &str, now: &str) {
        if let Some(record) = self.state.transcripts.get_mut(scene_id.as_str()) {
            record.status = FileStatus::Failed;
            record.last_error = Some(error.to_string());
            record.attempts += 1;
            record.last_seen = now.to_string();
            self.state.sync_count += 1;
            self.state.last_updated = now.to_string();
        }
    }

    /// Persist the current state atomically: write to a temp file in the
    /// same directory, fsync it, rename over the target path, then fsync
    /// the containing directory so the rename itself is durable.
    pub fn persist(&self) -> Result<(), TrackingError> {
        let rendered = serde_json::to_string_pretty(&self.state)?;
        let mut tmp_name = self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        tmp_name.push_str(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TrackingError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        }

        std::fs::write(&tmp_path, rendered.as_bytes()).map_err(|source| TrackingError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;

        let tmp_file = File::open(&tmp_path).map_err(|source| TrackingError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        tmp_file.sync_all().map_err(|source| TrackingError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        drop(tmp_file);

        std::fs::rename(&tmp_path, &self.path).map_err(|source| TrackingError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "tracking_tests.rs"]
mod tests;
