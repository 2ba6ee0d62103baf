// SPDX-License-Identifier: MIT

//! dnd-visualizerd
//!
//! Background process that watches a transcript directory, turns each
//! finished D&D session excerpt into an LLM-derived scene description,
//! and renders it through a local diffusion image server.
//!
//! The daemon is typically started once per table and left running for
//! the life of the session; it is not meant to be invoked per-transcript.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod healthcheck;
mod lock;
mod paths;
mod runner;
mod task;

use dnd_core::Config;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::runner::RunnerError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("dnd-visualizerd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("dnd-visualizerd {}", env!("CARGO_PKG_VERSION"));
                println!("Watches a transcript directory and turns new transcripts into rendered scene illustrations.");
                println!();
                println!("USAGE:");
                println!("    dnd-visualizerd");
                println!();
                println!("ENVIRONMENT:");
                println!("    DND_VISUALIZER_ROOT     pipeline root directory (default: current directory)");
                println!("    DND_VISUALIZER_CONFIG   path to config.toml (default: <root>/config.toml)");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: dnd-visualizerd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let root = env::root_dir();
    let config_path = env::config_path(&root);
    let config = Config::load_or_init(&config_path)?;
    let paths = paths::RunnerPaths::new(root.clone(), &config);

    std::fs::create_dir_all(&paths.log_dir)?;
    let log_path = paths.log_dir.join("dnd_visualizerd.log");
    rotate_log_if_needed(&log_path, config.logging.max_size_mb, config.logging.backup_count);

    let _log_guard = setup_logging(&paths.log_dir, &config.logging.level)?;

    info!(root = %paths.root.display(), "starting dnd-visualizerd");

    let cancel = CancellationToken::new();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
        signal_cancel.cancel();
    });

    match runner::run(root, cancel).await {
        Ok(()) => {
            info!("dnd-visualizerd stopped cleanly");
            Ok(())
        }
        Err(RunnerError::Lock(lock::LockError::AlreadyRunning { path })) => {
            eprintln!("dnd-visualizerd is already running (lock held at {path})");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "dnd-visualizerd exited with an error");
            Err(err.into())
        }
    }
}

/// Shift `dnd_visualizerd.log` through `.1..backup_count` before startup,
/// mirroring the original's `RotatingFileHandler(maxBytes=..., backupCount=...)`
/// which rotates on write; this port rotates once at startup instead, since
/// `tracing_appender::rolling::never` never rotates on its own.
fn rotate_log_if_needed(log_path: &std::path::Path, max_size_mb: u64, backup_count: u32) {
    let max_bytes = max_size_mb.saturating_mul(1024 * 1024);
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return,
    };
    if size < max_bytes || backup_count == 0 {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..backup_count).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(from, to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    log_dir: &std::path::Path,
    level: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(log_dir, "dnd_visualizerd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
