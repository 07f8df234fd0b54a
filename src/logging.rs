//! Logging setup for the binaries.
//!
//! Installs a global `tracing` subscriber that writes human-readable events
//! to stderr, keeping stdout free for reports. The level comes from
//! `RUST_LOG` and defaults to `info`.
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install the global subscriber. Fails if one is already installed.
pub fn init() -> Result<()> {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    Registry::default()
        .with(build_env_filter())
        .with(layer)
        .try_init()
        .map_err(|e| anyhow!("install tracing subscriber: {e}"))
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
