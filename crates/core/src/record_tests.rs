// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn new_record_starts_in_new_status() {
    let record = TrackedFileRecord::new(
        "scene_a_transkript.txt".to_string(),
        42,
        "2026-07-27T00:00:00+00:00".to_string(),
        "deadbeef".to_string(),
        "2026-07-27T00:00:00+00:00".to_string(),
    );
    assert_eq!(record.status, FileStatus::New);
    assert_eq!(record.scene_id, SceneId::new("scene_a"));
    assert!(record.previous_status.is_none());
    assert_eq!(record.sync_count, 0);
    assert!(!record.is_terminal());
}

#[test]
fn completed_status_is_terminal() {
    let mut record = TrackedFileRecord::new(
        "scene_a_transkript.txt".to_string(),
        42,
        "2026-07-27T00:00:00+00:00".to_string(),
        "deadbeef".to_string(),
        "2026-07-27T00:00:00+00:00".to_string(),
    );
    record.status = FileStatus::Completed;
    assert!(record.is_terminal());
}

#[test]
fn serializes_without_previous_status_when_absent() {
    let record = TrackedFileRecord::new(
        "scene_a_transkript.txt".to_string(),
        42,
        "2026-07-27T00:00:00+00:00".to_string(),
        "deadbeef".to_string(),
        "2026-07-27T00:00:00+00:00".to_string(),
    );
    let json = serde_json::to_string(&record).expect("serialize");
    assert!(!json.contains("previous_status"));
}

#[yare::parameterized(
    new = { FileStatus::New, "new" },
    detected = { FileStatus::Detected, "detected" },
    modified = { FileStatus::Modified, "modified" },
    completed = { FileStatus::Completed, "completed" },
    failed = { FileStatus::Failed, "failed" },
)]
fn as_str_matches_the_lowercase_serde_rename(status: FileStatus, expected: &str) {
    assert_eq!(status.as_str(), expected);
    let json = serde_json::to_string(&status).expect("serialize");
    assert_eq!(json, format!("\"{expected}\""));
}
