//! Logging initialization
//!
//! Batch runs log to the console and append to a per-run log file at the same
//! time, so an operator watching a run and an auditor reading the file later
//! see the same record.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::utils::error::Result;

/// Install the global tracing subscriber from the logging configuration.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call once per
/// process; subsequent calls return an error from the subscriber registry.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = config.console.then(|| fmt::layer().with_target(false));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
