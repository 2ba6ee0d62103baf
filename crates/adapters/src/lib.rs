// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dnd-adapters: external I/O — the image renderer's wire protocol, the
//! LLM host's HTTP API, subprocess lifecycle management for both
//! services, and filesystem watching.

pub mod image_client;
pub mod llm_client;
pub mod supervisor;
pub mod watcher;

pub use image_client::{ImageClient, ImageClientError, ImageRequest, ImageResponse};
pub use llm_client::{LlmClient, LlmClientError, LlmResponse};
pub use supervisor::{ServiceHandle, ServiceSpec, SupervisorError};
pub use watcher::{TranscriptEvent, TranscriptWatcher, WatcherError};
