// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

#[test]
fn writes_defaults_when_missing() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");

    let loaded = Config::load_or_init(&path).expect("load_or_init");
    assert_eq!(loaded.reconciliation_interval_secs, 3);
    assert_eq!(loaded.healthcheck_interval_secs, 30);
    assert_eq!(loaded.fallback_mode, FallbackMode::Skip);
    assert!(path.exists());
}

#[test]
fn reloads_written_defaults_unchanged() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");

    Config::load_or_init(&path).expect("first load");
    let reloaded = Config::load_or_init(&path).expect("second load");
    assert_eq!(reloaded.image_server.port, 7860);
    assert_eq!(reloaded.llm.model, "llama3");
}

#[test]
fn ignores_unknown_keys_and_fills_missing_ones() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "reconciliation_interval_secs = 9\nsome_future_key = true\n",
    )
    .expect("write partial config");

    let config = Config::load_or_init(&path).expect("load_or_init");
    assert_eq!(config.reconciliation_interval_secs, 9);
    assert_eq!(config.healthcheck_interval_secs, 30);
}

#[test]
fn image_server_durations_match_seconds_fields() {
    let cfg = ImageServerConfig::default();
    assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.request_timeout(), Duration::from_secs(300));
    assert_eq!(cfg.retry_delay(), Duration::from_secs(10));
}

#[test]
fn directory_defaults_are_relative_to_the_daemon_s_working_directory() {
    let cfg = Config::default();
    assert_eq!(cfg.watched_dir, std::path::Path::new("transkripte"));
    assert_eq!(cfg.output_dir, std::path::Path::new("scene"));
}

#[test]
fn llm_launch_command_defaults_to_unmanaged() {
    let cfg = LlmConfig::default();
    assert_eq!(cfg.launch_command, None);
    assert_eq!(cfg.startup_poll_interval(), Duration::from_secs(2));
}

#[test]
fn logging_defaults_match_original_rotating_handler_limits() {
    let cfg = LoggingConfig::default();
    assert_eq!(cfg.max_size_mb, 10);
    assert_eq!(cfg.backup_count, 5);
    assert_eq!(cfg.level, "info");
}
