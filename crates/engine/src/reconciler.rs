// SPDX-License-Identifier: MIT

//! Reconciler: periodic filesystem scan against the tracking store,
//! dispatching changed scenes to per-scene worker tasks.
//!
//! The Reconciler is the sole writer to the tracking store. The Scene
//! Processor never touches it directly — it returns a [`ProcessOutcome`]
//! and the Reconciler translates that into `mark_completed`/`mark_failed`
//! calls, serialized behind its own store lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dnd_adapters::watcher::TranscriptEvent;
use dnd_core::time_fmt::now_iso8601;
use dnd_core::SceneId;
use dnd_storage::{ScanEntry, SyncOutcome, TrackingError, TrackingStore, TRACKING_FILENAME};

use crate::artifact::ArtifactPaths;
use crate::processor::{ProcessOutcome, SceneProcessor};

const BASE_IDLE_DELAY: Duration = Duration::from_secs(3);
const SLOW_PASS_IDLE_DELAY: Duration = Duration::from_secs(5);
const SLOW_PASS_THRESHOLD: Duration = Duration::from_secs(1);
const ERROR_BACKOFF_THRESHOLD: u32 = 5;
const ERROR_BACKOFF_CAP_SECS: u64 = 30;
const TRANSCRIPT_SUFFIX: &str = "_transkript.txt";

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to scan watched directory {path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// Scans the watched directory, reconciles against the tracking store, and
/// dispatches changed scenes to the scene processor. Per-scene keyed locks
/// (a plain `HashMap<SceneId, Arc<Mutex<()>>>`, no external map crate) make
/// sure a modified file cannot race its own in-flight predecessor.
pub struct Reconciler {
    watched_dir: PathBuf,
    output_dir: PathBuf,
    store: AsyncMutex<TrackingStore>,
    processor: Arc<SceneProcessor>,
    scene_locks: std::sync::Mutex<HashMap<SceneId, Arc<AsyncMutex<()>>>>,
    in_flight: AtomicUsize,
}

impl Reconciler {
    pub fn new(
        watched_dir: PathBuf,
        output_dir: PathBuf,
        store: TrackingStore,
        processor: Arc<SceneProcessor>,
    ) -> Self {
        Self {
            watched_dir,
            output_dir,
            store: AsyncMutex::new(store),
            processor,
            scene_locks: std::sync::Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn watched_dir(&self) -> &Path {
        &self.watched_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of scenes the tracking store currently holds a record for.
    /// Used by the healthcheck loop's current-vs-tracked drift comparison.
    pub async fn tracked_count(&self) -> usize {
        self.store.lock().await.snapshot().transcripts.len()
    }

    /// Number of transcript files currently present on disk. Used
    /// alongside `tracked_count` for the same drift comparison.
    pub fn current_count(&self) -> Result<usize, ReconcileError> {
        Ok(scan_watched_dir(&self.watched_dir)?.len())
    }

    /// Run one reconciliation pass: scan the watched directory, sync
    /// against the tracking store, persist if anything changed, and
    /// dispatch newly-enqueued scenes. Returns the number of scenes
    /// dispatched. Used both for the runner's one synchronous startup pass
    /// and by `run`'s periodic loop.
    pub async fn reconcile_once(self: &Arc<Self>) -> Result<usize, ReconcileError> {
        let scan = scan_watched_dir(&self.watched_dir)?;
        let already_complete = scan
            .iter()
            .filter(|entry| self.output_pair_complete(&entry.filename))
            .map(|entry| entry.filename.clone())
            .collect();
        let now = now_iso8601();

        let outcome = {
            let mut store = self.store.lock().await;
            let outcome = store.sync_with_scan(&scan, &already_complete, &now);
            if outcome.mutated {
                store.persist()?;
            }
            outcome
        };

        self.forget_removed(&outcome);
        Ok(self.dispatch(&outcome))
    }

    /// One-shot startup bootstrap: process the most recently modified
    /// transcript that has not reached `completed`, even though the
    /// periodic loop would otherwise see an unchanged hash and skip it.
    /// Covers a daemon restart mid-processing against an otherwise
    /// unchanged transcript directory.
    pub async fn bootstrap_latest_incomplete(self: &Arc<Self>) -> Option<SceneId> {
        let latest = {
            let store = self.store.lock().await;
            store
                .snapshot()
                .transcripts
                .values()
                .filter(|record| !record.is_terminal())
                .max_by(|a, b| a.modified.cmp(&b.modified))
                .map(|record| record.scene_id.clone())
        };

        if let Some(scene_id) = latest.clone() {
            info!(scene_id = %scene_id, "bootstrapping latest incomplete transcript");
            self.spawn_worker(scene_id);
        }

        latest
    }

    /// Drive the periodic reconciliation loop until `cancel` fires. Wakes
    /// on `idle_delay` or on a watcher hint, whichever comes first.
    pub async fn run(
        self: Arc<Self>,
        mut hints: mpsc::Receiver<TranscriptEvent>,
        cancel: CancellationToken,
    ) {
        let mut idle_delay = BASE_IDLE_DELAY;
        let mut consecutive_errors: u32 = 0;
        let mut hints_alive = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reconciler stopping on cancellation");
                    break;
                }
                _ = tokio::time::sleep(idle_delay) => {}
                hint = hints.recv(), if hints_alive => {
                    match hint {
                        Some(event) => debug!(?event, "reconciler woken by watcher hint"),
                        None => {
                            warn!("watcher hint channel closed, reconciler continuing on timer alone");
                            hints_alive = false;
                        }
                    }
                }
            }

            let started = Instant::now();
            match self.reconcile_once().await {
                Ok(dispatched) => {
                    consecutive_errors = 0;
                    if dispatched > 0 {
                        debug!(dispatched, "reconciliation dispatched jobs");
                    }
                    idle_delay = if started.elapsed() > SLOW_PASS_THRESHOLD {
                        SLOW_PASS_IDLE_DELAY
                    } else {
                        BASE_IDLE_DELAY
                    };
                }
                Err(err) => {
                    consecutive_errors += 1;
                    error!(error = %err, consecutive_errors, "reconciliation pass failed");
                    if consecutive_errors >= ERROR_BACKOFF_THRESHOLD {
                        self.dump_diagnostics().await;
                    }
                    let backoff_secs = 5u64.saturating_add(u64::from(consecutive_errors) * 2);
                    idle_delay = Duration::from_secs(backoff_secs.min(ERROR_BACKOFF_CAP_SECS));
                }
            }
        }
    }

    fn output_pair_complete(&self, filename: &str) -> bool {
        let scene_id = SceneId::from_transcript_filename(filename);
        ArtifactPaths::for_scene(&self.watched_dir, &self.output_dir, &scene_id).output_pair_complete()
    }

    fn forget_removed(&self, outcome: &SyncOutcome) {
        if outcome.removed.is_empty() {
            return;
        }
        let mut locks = match self.scene_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for scene_id in &outcome.removed {
            locks.remove(scene_id);
        }
    }

    fn dispatch(self: &Arc<Self>, outcome: &SyncOutcome) -> usize {
        let mut dispatched = 0;
        for synced in &outcome.synced {
            if !synced.action.should_enqueue() {
                continue;
            }
            dispatched += 1;
            self.spawn_worker(synced.scene_id.clone());
        }
        dispatched
    }

    fn spawn_worker(self: &Arc<Self>, scene_id: SceneId) {
        let reconciler = Arc::clone(self);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            reconciler.process_scene(scene_id).await;
            reconciler.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn scene_lock(&self, scene_id: &SceneId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.scene_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(scene_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    async fn process_scene(&self, scene_id: SceneId) {
        let lock = self.scene_lock(&scene_id);
        let _guard = lock.lock().await;

        let result = self.processor.process(&scene_id).await;
        let now = now_iso8601();
        let mut store = self.store.lock().await;

        match result {
            Ok(ProcessOutcome::Completed { details: Some(details), .. }) => {
                store.mark_completed_with_details(&scene_id, &details, &now);
            }
            Ok(ProcessOutcome::Completed { details: None, .. }) => {
                store.mark_completed(&scene_id, &now);
            }
            Ok(ProcessOutcome::Failed { reason }) => {
                warn!(scene_id = %scene_id, reason = %reason, "scene processing failed");
                store.mark_failed(&scene_id, &reason, &now);
            }
            Err(err) => {
                warn!(scene_id = %scene_id, error = %err, "scene processor errored before a terminal state");
                store.mark_failed(&scene_id, &err.to_string(), &now);
            }
        }

        if let Err(err) = store.persist() {
            error!(scene_id = %scene_id, error = %err, "failed to persist tracking store after processing");
        }
    }

    async fn dump_diagnostics(&self) {
        let watched_present = self.watched_dir.is_dir();
        let output_present = self.output_dir.is_dir();
        let tracking_path = self.watched_dir.join(TRACKING_FILENAME);
        let tracking_bytes = std::fs::metadata(&tracking_path).map(|m| m.len()).ok();
        let free_disk_bytes = fs2::free_space(&self.watched_dir).ok();
        error!(
            watched_dir_present = watched_present,
            output_dir_present = output_present,
            tracking_file_bytes = ?tracking_bytes,
            free_disk_bytes = ?free_disk_bytes,
            in_flight_tasks = self.in_flight_count(),
            "reconciler diagnostic dump after repeated failures"
        );
    }
}

fn scan_watched_dir(dir: &Path) -> Result<Vec<ScanEntry>, ReconcileError> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| ReconcileError::Scan {
        path: dir.display().to_string(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| ReconcileError::Scan {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !filename.ends_with(TRANSCRIPT_SUFFIX) {
            continue;
        }

        let metadata = entry.metadata().map_err(|source| ReconcileError::Scan {
            path: path.display().to_string(),
            source,
        })?;
        let modified = metadata
            .modified()
            .map(|time| chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339())
            .unwrap_or_else(|_| now_iso8601());
        let content = std::fs::read(&path).map_err(|source| ReconcileError::Scan {
            path: path.display().to_string(),
            source,
        })?;

        entries.push(ScanEntry {
            filename: filename.to_string(),
            size: metadata.len(),
            modified,
            hash: dnd_storage::hash::hex_digest(&content),
        });
    }

    Ok(entries)
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
