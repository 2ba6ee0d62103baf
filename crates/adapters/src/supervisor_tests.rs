// SPDX-License-Identifier: MIT

use super::*;

#[tokio::test]
async fn spawn_and_shutdown_a_sleeping_child() {
    let spec = ServiceSpec {
        name: "sleeper".to_string(),
        program: "sleep".to_string(),
        args: vec!["30".to_string()],
        shutdown_grace: Duration::from_secs(2),
    };
    let handle = ServiceHandle::spawn(spec).expect("spawn");
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn has_exited_reflects_process_state() {
    let spec = ServiceSpec {
        name: "quick".to_string(),
        program: "true".to_string(),
        args: vec![],
        shutdown_grace: Duration::from_secs(1),
    };
    let mut handle = ServiceHandle::spawn(spec).expect("spawn");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(handle.has_exited());
}

#[tokio::test]
async fn image_server_reachability_fails_fast_with_no_listener() {
    let reachable = wait_for_image_server_reachable("127.0.0.1", 1, 2, Duration::from_millis(10)).await;
    assert!(!reachable);
}

#[tokio::test]
async fn llm_health_probe_times_out_when_unreachable() {
    let http = reqwest::Client::new();
    let healthy = wait_for_llm_healthy(
        &http,
        "http://127.0.0.1:1",
        "llama3",
        Duration::from_millis(50),
        Duration::from_millis(20),
    )
    .await;
    assert!(!healthy);
}
