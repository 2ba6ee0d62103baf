// SPDX-License-Identifier: MIT

use super::*;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

#[tokio::test]
async fn unreachable_host_classifies_as_unreachable() {
    let client = ImageClient::new(
        "127.0.0.1",
        1, // reserved port, nothing listens here
        Duration::from_millis(200),
        Duration::from_secs(1),
    );
    let result = client
        .generate(&ImageRequest {
            prompt: "a dragon".to_string(),
            file: "scene_image.png".to_string(),
        })
        .await;
    assert!(matches!(result, Err(ImageClientError::Unreachable { .. })));
}

#[tokio::test]
async fn parses_ok_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.expect("read");
        let request: serde_json::Value = serde_json::from_slice(&buf[..n]).expect("parse request");
        assert_eq!(request["file"], "scene_image.png");
        stream
            .write_all(
                b"{\"file\":\"scene_image.png\",\"timings\":{\"inference_s\":1.0,\"save_s\":0.1,\"total_s\":1.1}}\n",
            )
            .await
            .expect("write response");
    });

    let client = ImageClient::new(
        &addr.ip().to_string(),
        addr.port(),
        Duration::from_secs(2),
        Duration::from_secs(2),
    );
    let response = client
        .generate(&ImageRequest {
            prompt: "a dragon".to_string(),
            file: "scene_image.png".to_string(),
        })
        .await
        .expect("generate");

    assert_eq!(response.file, "scene_image.png");
    assert_eq!(response.timings.total_s, 1.1);

    server.await.expect("server task");
}

#[tokio::test]
async fn server_error_becomes_server_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await.expect("read");
        stream
            .write_all(b"{\"error\":\"out of memory\"}\n")
            .await
            .expect("write response");
    });

    let client = ImageClient::new(
        &addr.ip().to_string(),
        addr.port(),
        Duration::from_secs(2),
        Duration::from_secs(2),
    );
    let result = client
        .generate(&ImageRequest {
            prompt: "a dragon".to_string(),
            file: "scene_image.png".to_string(),
        })
        .await;

    match result {
        Err(ImageClientError::ServerError(message)) => assert_eq!(message, "out of memory"),
        other => panic!("expected ServerError, got {other:?}"),
    }

    server.await.expect("server task");
}

#[tokio::test]
async fn empty_response_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await.expect("read");
        drop(stream);
    });

    let client = ImageClient::new(
        &addr.ip().to_string(),
        addr.port(),
        Duration::from_secs(2),
        Duration::from_secs(2),
    );
    let result = client
        .generate(&ImageRequest {
            prompt: "a dragon".to_string(),
            file: "scene_image.png".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ImageClientError::ProtocolError(_))));
    server.await.expect("server task");
}
