// SPDX-License-Identifier: MIT

//! A tokio task wrapped with a liveness flag the healthcheck loop can poll
//! without needing to own (and thus be unable to separately join) the
//! `JoinHandle`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

pub struct SupervisedTask {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SupervisedTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_task = Arc::clone(&alive);
        let handle = tokio::spawn(async move {
            future.await;
            alive_for_task.store(false, Ordering::SeqCst);
        });
        Self { alive, handle }
    }

    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the task to finish. Does not abort it —
    /// callers that need a hard stop should cancel it first (e.g. via a
    /// shared `CancellationToken`) and only then join.
    pub async fn join(self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.handle).await.is_err() {
            tracing::warn!("supervised task did not finish within the shutdown timeout");
        }
    }
}
