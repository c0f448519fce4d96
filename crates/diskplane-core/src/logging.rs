//! Installs the process-wide `tracing` subscriber.

use crate::config::{ClientConfig, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a registry with an env filter and a text or JSON fmt layer.
///
/// `RUST_LOG` wins over `config.log_filter`. Returns false when a global
/// subscriber was already installed.
pub fn init(config: &ClientConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(endpoint = %config.endpoint, "logging initialized");
            true
        }
        Err(_) => false,
    }
}
