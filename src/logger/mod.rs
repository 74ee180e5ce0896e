// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// Logs go to stderr and, if available, to the systemd journal. `RUST_LOG`
/// overrides the default filter.
pub fn init_logger() -> Result<()> {
    let level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,cosmic_mux={level},smithay={level}")))
        .context("Failed to build log filter")?;

    let fmt = fmt::layer().compact().with_writer(std::io::stderr);
    let (journald, journald_err) = match tracing_journald::layer() {
        Ok(layer) => (Some(layer), None),
        Err(err) => (None, Some(err)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(journald)
        .try_init()
        .context("Failed to install global logger")?;

    if let Some(err) = journald_err {
        debug!(?err, "Journald not available, logging to stderr only.");
    }

    log_panics::init();

    info!(
        "Version: {} ({})",
        std::env!("CARGO_PKG_VERSION"),
        std::option_env!("GIT_HASH").unwrap_or("Unknown")
    );

    Ok(())
}
