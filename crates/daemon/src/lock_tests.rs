// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

#[test]
fn acquires_a_fresh_lock_and_records_the_pid() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dnd_runner.lock");

    let lock = SingleInstanceLock::acquire(&path).expect("acquire");
    assert_eq!(lock.path(), path);

    let contents = std::fs::read_to_string(&path).expect("read lock file");
    assert_eq!(contents.trim(), std::process::id().to_string());
}

#[test]
fn a_second_acquire_while_the_first_is_held_fails() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dnd_runner.lock");

    let _held = SingleInstanceLock::acquire(&path).expect("first acquire");
    let second = SingleInstanceLock::acquire(&path);

    assert!(matches!(second, Err(LockError::AlreadyRunning { .. })));
}

#[test]
fn dropping_the_lock_releases_it_for_the_next_acquire() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dnd_runner.lock");

    let first = SingleInstanceLock::acquire(&path).expect("first acquire");
    drop(first);

    let second = SingleInstanceLock::acquire(&path);
    assert!(second.is_ok());
}
