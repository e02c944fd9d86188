//! Tracing subscriber setup shared by the paperflow binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter directive for a crate target and level, e.g. `paperflow_dedupe=info`
pub fn default_directive(target: &str, level: &str) -> String {
    format!("{}={}", target, level.trim().to_ascii_lowercase())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. With `logging.file` set, output
/// goes to that file (appended, no ANSI colours) instead of stderr.
pub fn init_logging(config: &LoggingConfig, target: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(target, &config.level)));

    let (file_layer, stderr_layer) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
