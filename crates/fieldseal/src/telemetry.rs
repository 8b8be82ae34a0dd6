//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No PII or key material** may appear in any log field: field values,
//!   ciphertext, seeds, and keys are never logged. Errors are logged by kind
//!   and provider message only.
//! - Log level comes from configuration (default `info`); `RUST_LOG` overrides it.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber with JSON-formatted output.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .context("failed to initialise tracing subscriber")?;

    Ok(())
}
