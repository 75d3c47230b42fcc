//! Observability infrastructure: tracing and metrics.
//!
//! Binaries call [`init`] once at startup. The library itself only emits
//! `tracing` events and `metrics` samples; without an installed subscriber or
//! recorder both are no-ops.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber and describe core metrics.
///
/// `default_level` applies when `RUST_LOG` is not set. Logs go to stderr so
/// command output on stdout stays clean.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    metrics::register_core_metrics();

    tracing::debug!("Observability initialized");
    Ok(())
}
