use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSection;

fn resolve_level(level: &str, debug: bool) -> Result<tracing::Level> {
    if debug {
        return Ok(tracing::Level::DEBUG);
    }
    level.trim().parse().context("Invalid log level")
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    init(level, debug, false)
}

pub fn init_from_config(logging: &LoggingSection) -> Result<()> {
    init(&logging.level, logging.debug, logging.json)
}

fn init(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = resolve_level(level, debug)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        registry
            .with(fmt::layer())
            .try_init()
            .context("Failed to install log subscriber")?;
    }
    Ok(())
}
