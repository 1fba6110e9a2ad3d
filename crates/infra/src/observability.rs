//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over `logging.level` when set.

use std::sync::Once;

use storesync_domain::{LoggingConfig, Result, StoreSyncError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Build the filter from `RUST_LOG`, falling back to `config.level`.
///
/// # Errors
/// Returns `StoreSyncError::Config` when the configured directive is invalid.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| StoreSyncError::Config(format!("invalid logging.level '{}': {e}", config.level)))
}

/// Install the global subscriber. Later calls are no-ops, as is a call made
/// after some other subscriber was installed.
///
/// # Errors
/// Returns `StoreSyncError::Config` when the level directive does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let json = config.json;

    INIT.call_once(move || {
        let registry = tracing_subscriber::registry().with(filter);
        let installed = if json {
            registry.with(fmt::layer().json().with_current_span(true)).try_init()
        } else {
            registry.with(fmt::layer().with_target(true)).try_init()
        };
        if installed.is_err() {
            tracing::debug!("global subscriber already installed");
        }
    });
    Ok(())
}
