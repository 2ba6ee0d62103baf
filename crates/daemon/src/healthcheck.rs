// SPDX-License-Identifier: MIT

//! Healthcheck loop: verifies the Reconciler and Watcher are still alive,
//! compares tracked vs. actual file counts, and emits periodic heartbeat
//! and status-snapshot log lines.
//!
//! Grounded in `_healthcheck_loop`'s 30s poll with its `% 120 == 0`
//! heartbeat and this port's own 5-minute full-status addition (matching
//! `run`'s 300s `_log_system_status` cadence, folded into the same loop
//! instead of a second timer).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dnd_engine::Reconciler;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);
const STATUS_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(300);

/// Liveness flags for the two components the healthcheck loop itself
/// does not own.
pub struct HealthcheckHandles {
    pub reconciler_alive: Arc<AtomicBool>,
    pub watcher_alive: Arc<AtomicBool>,
}

pub async fn run(
    reconciler: Arc<Reconciler>,
    handles: HealthcheckHandles,
    interval: Duration,
    cancel: CancellationToken,
) {
    let start = Instant::now();
    let mut last_heartbeat = Instant::now();
    let mut last_snapshot = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("healthcheck loop stopping on cancellation");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if !handles.reconciler_alive.load(Ordering::SeqCst) {
            error!("healthcheck: reconciler task is no longer running");
        }
        if !handles.watcher_alive.load(Ordering::SeqCst) {
            error!("healthcheck: watcher is no longer running");
        }

        match reconciler.current_count() {
            Ok(current) => {
                let tracked = reconciler.tracked_count().await;
                if current != tracked {
                    warn!(current, tracked, "healthcheck: tracked/actual file count drift");
                }
            }
            Err(err) => error!(error = %err, "healthcheck: failed to scan watched directory"),
        }

        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            info!(
                uptime_secs = start.elapsed().as_secs(),
                in_flight = reconciler.in_flight_count(),
                "heartbeat: system running"
            );
            last_heartbeat = Instant::now();
        }

        if last_snapshot.elapsed() >= STATUS_SNAPSHOT_INTERVAL {
            let tracked = reconciler.tracked_count().await;
            info!(
                uptime_secs = start.elapsed().as_secs(),
                tracked,
                in_flight = reconciler.in_flight_count(),
                "status snapshot"
            );
            last_snapshot = Instant::now();
        }
    }
}

#[cfg(test)]
#[path = "healthcheck_tests.rs"]
mod tests;
