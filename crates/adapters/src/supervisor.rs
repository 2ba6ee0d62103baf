// SPDX-License-Identifier: MIT

//! Service supervisor: starts and stops the LLM host and image renderer
//! as child processes, probes their health, and tears them down by
//! signaling their whole process group.

use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} exited before becoming healthy")]
    ExitedEarly { name: String },
    #[error("{name} health check failed after startup window")]
    Unhealthy { name: String },
    #[error("failed to signal {name} (pid {pid}): {source}")]
    Signal {
        name: String,
        pid: i32,
        #[source]
        source: nix::Error,
    },
}

/// How to launch and probe one supervised service.
pub struct ServiceSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub shutdown_grace: Duration,
}

/// A running supervised child process.
pub struct ServiceHandle {
    name: String,
    child: Child,
    pgid: Pid,
    shutdown_grace: Duration,
}

impl ServiceHandle {
    pub fn spawn(spec: ServiceSpec) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.kill_on_drop(false);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            name: spec.name.clone(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::Spawn {
                name: spec.name.clone(),
                source: std::io::Error::other("child has no pid"),
            })?;
        let child_pid = Pid::from_raw(pid as i32);

        // Put the child in its own process group so shutdown can signal
        // every descendant it spawns, not just the immediate child. Best
        // effort: if the child has already exited this is a harmless no-op.
        if let Err(source) = nix::unistd::setpgid(child_pid, child_pid) {
            warn!(service = %spec.name, pid, %source, "failed to move child into its own process group");
        }

        if let Some(stdout) = child.stdout.take() {
            spawn_log_pump(spec.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_pump(spec.name.clone(), "stderr", stderr);
        }

        info!(service = %spec.name, pid, "service started");

        Ok(Self {
            name: spec.name,
            child,
            pgid: child_pid,
            shutdown_grace: spec.shutdown_grace,
        })
    }

    /// Returns `true` once the process has exited on its own.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// SIGTERM the process group, wait `shutdown_grace`, then SIGKILL if
    /// it hasn't exited.
    pub async fn shutdown(mut self) -> Result<(), SupervisorError> {
        signal::killpg(self.pgid, Signal::SIGTERM).map_err(|source| SupervisorError::Signal {
            name: self.name.clone(),
            pid: self.pgid.as_raw(),
            source,
        })?;

        let waited = tokio::time::timeout(self.shutdown_grace, self.child.wait()).await;
        if waited.is_err() {
            warn!(service = %self.name, "did not exit after SIGTERM, sending SIGKILL");
            signal::killpg(self.pgid, Signal::SIGKILL).map_err(|source| SupervisorError::Signal {
                name: self.name.clone(),
                pid: self.pgid.as_raw(),
                source,
            })?;
            let _ = self.child.wait().await;
        }

        Ok(())
    }
}

/// Pipe a supervised child's stdout/stderr line-by-line into dedicated
/// `tracing` targets (`service::<name>::stdout`/`stderr`) rather than
/// discarding it. One line per `tracing` event, matching the original's
/// per-line `RotatingFileHandler` writes.
fn spawn_log_pump(service: String, stream_name: &'static str, stream: impl tokio::io::AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if stream_name == "stderr" {
                        warn!(target: "service_output", service = %service, stream = stream_name, "{line}");
                    } else {
                        info!(target: "service_output", service = %service, stream = stream_name, "{line}");
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(service = %service, stream = stream_name, error = %err, "log pump read error");
                    break;
                }
            }
        }
    });
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Poll `<base_url>/api/version` until HTTP 200 comes back with the
/// required model listed, or the startup window elapses.
pub async fn wait_for_llm_healthy(
    http: &reqwest::Client,
    base_url: &str,
    required_model: &str,
    startup_window: Duration,
    poll_interval: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + startup_window;
    let url = format!("{}/api/version", base_url.trim_end_matches('/'));

    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = http.get(&url).send().await {
            if response.status().is_success() {
                if let Ok(version) = response.json::<VersionResponse>().await {
                    if version.models.iter().any(|m| m.name == required_model) {
                        return true;
                    }
                }
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Probe bare TCP reachability of the image server, retrying up to
/// `max_retries` times spaced `retry_delay` apart.
pub async fn wait_for_image_server_reachable(
    host: &str,
    port: u16,
    max_retries: u32,
    retry_delay: Duration,
) -> bool {
    let addr = format!("{host}:{port}");
    for attempt in 0..max_retries.max(1) {
        if tokio::net::TcpStream::connect(&addr).await.is_ok() {
            return true;
        }
        info!(attempt = attempt + 1, %addr, "image server not yet reachable");
        if attempt + 1 < max_retries.max(1) {
            tokio::time::sleep(retry_delay).await;
        }
    }
    false
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
