// SPDX-License-Identifier: MIT

//! Client for the image renderer's line-delimited JSON protocol over TCP.
//!
//! One connection per request: connect, write a single JSON line, read a
//! single JSON line back, close. Retries are the scene processor's
//! responsibility, not the client's — this module only classifies
//! failures so callers can decide whether a retry is worthwhile.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum ImageClientError {
    #[error("image server at {addr} is unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image server at {addr} did not respond within {timeout_secs}s")]
    Timeout { addr: String, timeout_secs: u64 },
    #[error("malformed response from image server: {0}")]
    ProtocolError(String),
    #[error("image server reported an error: {0}")]
    ServerError(String),
}

/// `file` is a basename only; the server resolves it against its own
/// configured output directory.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTimings {
    pub inference_s: f64,
    pub save_s: f64,
    pub total_s: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    pub file: String,
    pub timings: ImageTimings,
}

/// The wire shape has no tag field: success carries `file`/`timings`,
/// failure carries only `error`. Decoded untagged and re-exposed as
/// [`ImageResponse`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Ok { file: String, timings: ImageTimings },
    Error { error: String },
}

pub struct ImageClient {
    addr: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ImageClient {
    pub fn new(host: &str, port: u16, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            connect_timeout,
            request_timeout,
        }
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ImageClientError> {
        let connect = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr));
        let stream = match connect.await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ImageClientError::Unreachable {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ImageClientError::Unreachable {
                    addr: self.addr.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };

        tokio::time::timeout(self.request_timeout, self.exchange(stream, request))
            .await
            .map_err(|_| ImageClientError::Timeout {
                addr: self.addr.clone(),
                timeout_secs: self.request_timeout.as_secs(),
            })?
    }

    async fn exchange(
        &self,
        stream: TcpStream,
        request: &ImageRequest,
    ) -> Result<ImageResponse, ImageClientError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = serde_json::to_string(request)
            .map_err(|e| ImageClientError::ProtocolError(e.to_string()))?;
        line.push('\n');

        write_half
            .write_all(line.as_bytes())
            .await
            .map_err(|source| ImageClientError::Unreachable {
                addr: self.addr.clone(),
                source,
            })?;

        let mut response_line = String::new();
        let bytes_read = reader
            .read_line(&mut response_line)
            .await
            .map_err(|source| ImageClientError::Unreachable {
                addr: self.addr.clone(),
                source,
            })?;

        if bytes_read == 0 || response_line.trim().is_empty() {
            return Err(ImageClientError::ProtocolError(
                "connection closed before a response was received".to_string(),
            ));
        }

        let wire: WireResponse = serde_json::from_str(response_line.trim())
            .map_err(|e| ImageClientError::ProtocolError(e.to_string()))?;

        match wire {
            WireResponse::Ok { file, timings } => Ok(ImageResponse { file, timings }),
            WireResponse::Error { error } => Err(ImageClientError::ServerError(error)),
        }
    }
}

#[cfg(test)]
#[path = "image_client_tests.rs"]
mod tests;
