use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where log lines go.
pub(crate) enum LogTarget {
    /// Append to a file; the terminal belongs to the UI.
    File(PathBuf),
    /// Plain stderr for headless runs.
    Stderr,
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub(crate) fn init_tracing(level: &str, target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_unset| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    match target {
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()?;
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr).with_target(true))
                .try_init()?;
        }
    }

    tracing::info!("Starting dustroute {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
