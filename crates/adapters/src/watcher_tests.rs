// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;
use tokio::sync::mpsc;

#[tokio::test]
async fn ignores_non_transcript_files() {
    let dir = tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(8);
    let _watcher = TranscriptWatcher::start(dir.path(), tx).expect("start watcher");

    std::fs::write(dir.path().join("notes.txt"), b"irrelevant").expect("write");

    let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(result.is_err(), "expected no event for a non-transcript file");
}

#[tokio::test]
async fn settles_before_forwarding_created_event() {
    let dir = tempdir().expect("tempdir");
    let (tx, mut rx) = mpsc::channel(8);
    let _watcher = TranscriptWatcher::start(dir.path(), tx).expect("start watcher");

    let path = dir.path().join("scene_001_transkript.txt");
    std::fs::write(&path, b"content").expect("write");

    let started = tokio::time::Instant::now();
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event arrives")
        .expect("channel open");

    assert!(started.elapsed() >= Duration::from_millis(1900));
    match event {
        TranscriptEvent::Created(p) => assert_eq!(p, path),
        other => panic!("expected Created, got {other:?}"),
    }
}
