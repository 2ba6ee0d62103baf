// SPDX-License-Identifier: MIT

//! The tracked file record: the per-scene state the tracking store persists.

use serde::{Deserialize, Serialize};

use crate::id::SceneId;

/// Lifecycle state of a tracked transcript/scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    New,
    Detected,
    Modified,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::New => "new",
            FileStatus::Detected => "detected",
            FileStatus::Modified => "modified",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }
}

/// Everything the tracking store knows about one transcript file.
///
/// Field set matches the documented tracking file schema (`filename`,
/// `size`, `modified`, `hash`, `status`, `last_seen`, `detected_at`,
/// `modified_at`, `previous_status`, `details`) plus a few additive
/// bookkeeping fields (`scene_id`, `sync_count`, `last_error`, `attempts`)
/// that readers of the documented shape are expected to tolerate and
/// ignore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFileRecord {
    pub filename: String,
    pub scene_id: SceneId,
    /// Byte size of the transcript at last observation.
    pub size: u64,
    /// Filesystem modification time of the transcript at last
    /// observation, RFC 3339.
    pub modified: String,
    /// MD5 hex digest of the transcript's content at last observation.
    pub hash: String,
    pub status: FileStatus,
    /// The status this record held immediately before the current one, set
    /// only on a `new -> modified` or `completed -> modified` transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<FileStatus>,
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    /// Free-text observability note, e.g. "llm response recovered via
    /// fallback parsing" or the `prompt_only` fallback-mode annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Number of times `apply()` has mutated this record.
    #[serde(default)]
    pub sync_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
}

impl TrackedFileRecord {
    pub fn new(filename: String, size: u64, modified: String, hash: String, now: String) -> Self {
        let scene_id = SceneId::from_transcript_filename(&filename);
        Self {
            filename,
            scene_id,
            size,
            modified,
            hash,
            status: FileStatus::New,
            previous_status: None,
            last_seen: now.clone(),
            detected_at: Some(now),
            modified_at: None,
            details: None,
            sync_count: 0,
            last_error: None,
            attempts: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, FileStatus::Completed)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
