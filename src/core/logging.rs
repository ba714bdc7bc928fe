//! Structured logger setup.
//!
//! Production emits one JSON object per record, development emits readable
//! text. Every record produced by the bot carries an `event` field naming the
//! occurrence; operators grep for those names, so they are part of the
//! observable contract.

use anyhow::Result;
use tracing::Span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

use crate::core::config::{AppEnv, Config};

/// Value of the `service` field attached to every record.
pub const SERVICE_NAME: &str = "telegram-bot";

/// Installs the global subscriber for `config` and returns the root span that
/// carries the `service` and `env` fields. Instrument the top-level future with
/// it so every record inherits those fields.
pub fn init_logger(config: &Config) -> Result<Span> {
    // RUST_LOG overrides LOG_LEVEL for ad-hoc debugging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.log_level.into()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(false);

    match config.app_env {
        AppEnv::Development => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("install text logger: {e}"))?,
        AppEnv::Production => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("install json logger: {e}"))?,
    }

    Ok(root_span(config.app_env))
}

/// Minimal stderr logger for failures that happen before configuration is
/// available (for example a configuration error itself).
pub fn init_fallback_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(std::io::stderr)
        .json()
        .flatten_event(true)
        .try_init();
}

/// Root span shared by every component of a running bot.
pub fn root_span(app_env: AppEnv) -> Span {
    tracing::info_span!("bot", service = SERVICE_NAME, env = %app_env)
}
