// SPDX-License-Identifier: MIT

//! Filesystem watcher for transcript files.
//!
//! Wraps `notify` to watch a directory for `*_transkript.txt` files,
//! debouncing `Created` events by a settle delay so the reconciler never
//! observes a file while it's still being written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("failed to start filesystem watcher on {path}: {source}")]
    Start {
        path: String,
        #[source]
        source: notify::Error,
    },
}

#[derive(Debug, Clone)]
pub enum TranscriptEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

const TRANSCRIPT_SUFFIX: &str = "_transkript.txt";
const CREATED_SETTLE_DELAY: Duration = Duration::from_secs(2);

fn is_transcript(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(TRANSCRIPT_SUFFIX))
        .unwrap_or(false)
}

/// Watches `dir` and forwards debounced transcript events on `tx`.
///
/// Returns the live `RecommendedWatcher` — it must stay alive for as long
/// as events should keep flowing; dropping it stops the watch.
pub struct TranscriptWatcher {
    _watcher: RecommendedWatcher,
}

impl TranscriptWatcher {
    pub fn start(dir: &Path, tx: mpsc::Sender<TranscriptEvent>) -> Result<Self, WatcherError> {
        let runtime = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "filesystem watch error");
                    return;
                }
            };
            dispatch(event, &tx, &runtime);
        })
        .map_err(|source| WatcherError::Start {
            path: dir.display().to_string(),
            source,
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Start {
                path: dir.display().to_string(),
                source,
            })?;

        Ok(Self { _watcher: watcher })
    }
}

fn dispatch(event: Event, tx: &mpsc::Sender<TranscriptEvent>, runtime: &tokio::runtime::Handle) {
    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|p| is_transcript(p))
        .cloned()
        .collect();
    if paths.is_empty() {
        return;
    }

    for path in paths {
        let transcript_event = match event.kind {
            EventKind::Create(_) => Some(TranscriptEvent::Created(path.clone())),
            EventKind::Modify(_) => Some(TranscriptEvent::Modified(path.clone())),
            EventKind::Remove(_) => Some(TranscriptEvent::Removed(path.clone())),
            _ => None,
        };

        let Some(transcript_event) = transcript_event else {
            continue;
        };

        let tx = tx.clone();
        runtime.spawn(async move {
            if let TranscriptEvent::Created(ref path) = transcript_event {
                debug!(path = %path.display(), "transcript created, settling before dispatch");
                tokio::time::sleep(CREATED_SETTLE_DELAY).await;
            }
            if tx.send(transcript_event).await.is_err() {
                debug!("transcript event channel closed, dropping event");
            }
        });
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
