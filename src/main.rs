use std::process::ExitCode;
use std::time::Instant;

use tracing::{Instrument, info};

use tg_gatekeeper::Config;
use tg_gatekeeper::cli::Cli;
use tg_gatekeeper::core::init_logger;
use tg_gatekeeper::core::logging::init_fallback_logger;
use tg_gatekeeper::lifecycle;

/// Main entry point for the Telegram bot
///
/// Loads configuration, then either prints it (`--config-only`) or runs the
/// bot until SIGINT/SIGTERM. Any startup failure exits with status 1.
#[tokio::main]
async fn main() -> ExitCode {
    let started_at = Instant::now();
    let cli = Cli::parse_args();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            init_fallback_logger();
            tracing::error!(event = "config_error", error = %err, "configuration error");
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let root = match init_logger(&config) {
        Ok(span) => span,
        Err(err) => {
            eprintln!("logger setup error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if cli.config_only {
        root.in_scope(|| info!(event = "config_only", "configuration check complete"));
        println!("configuration check: ok");
        println!("{}", config.redacted());
        return ExitCode::SUCCESS;
    }

    match lifecycle::run(config, started_at).instrument(root).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(event = "startup_error", error = format!("{err:#}"), "startup failed");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
