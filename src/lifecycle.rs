//! Startup wiring and graceful shutdown
//!
//! Startup is strictly ordered and fail-fast: connect, create indexes,
//! bootstrap the owner, then start polling. Shutdown always completes: the
//! poll loop gets a bounded grace period and the store is closed whether or
//! not the loop stopped in time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::core::config::{Config, timeouts};
use crate::core::web_server::start_health_server;
use crate::registration::{GroupRegistrar, OwnerBootstrapper, UserRegistrar};
use crate::storage::ports::{Closer, Pinger, bounded};
use crate::storage::{Gateway, StatsProvider, UserRepository, ensure_indexes};
use crate::telegram::{CommandHandlers, TelegramClient, UpdateDispatcher};

/// Long-running update source that stops when `cancel` fires.
#[async_trait]
pub trait Poller: Send + Sync {
    async fn run(&self, cancel: CancellationToken);
}

/// Grace periods applied during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimeouts {
    pub poller: Duration,
    pub disconnect: Duration,
}

impl Default for ShutdownTimeouts {
    fn default() -> Self {
        Self {
            poller: timeouts::TELEGRAM_SHUTDOWN,
            disconnect: timeouts::MONGO_DISCONNECT,
        }
    }
}

/// What happened during shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The poller returned before any signal arrived.
    pub stopped_early: bool,
    /// The poller did not stop within the grace period.
    pub poller_timed_out: bool,
    pub store_closed: bool,
}

/// Runs `poller` until `signal` resolves (or the poller stops on its own),
/// then cancels it, waits up to the grace period and closes `store`.
pub async fn supervise<S>(
    poller: Arc<dyn Poller>,
    store: &dyn Closer,
    signal: S,
    timeouts: ShutdownTimeouts,
    cancel: CancellationToken,
) -> ShutdownReport
where
    S: Future<Output = ()>,
{
    let mut report = ShutdownReport::default();

    let poll_cancel = cancel.clone();
    let mut polling = tokio::spawn(async move { poller.run(poll_cancel).await }.in_current_span());

    tokio::select! {
        _ = signal => {
            info!(event = "shutdown_signal", "received termination signal, stopping telegram polling");
        }
        _ = &mut polling => {
            warn!(event = "telegram_stopped_early", "telegram client stopped before shutdown signal");
            report.stopped_early = true;
        }
    }

    cancel.cancel();

    if !report.stopped_early && tokio::time::timeout(timeouts.poller, &mut polling).await.is_err() {
        warn!(
            event = "telegram_shutdown_timeout",
            timeout_ms = timeouts.poller.as_millis() as u64,
            "timed out waiting for telegram client to stop"
        );
        polling.abort();
        report.poller_timed_out = true;
    }

    match store.close(timeouts.disconnect).await {
        Ok(()) => {
            info!(event = "mongo_disconnect", "mongo client disconnected");
            report.store_closed = true;
        }
        Err(err) => error!(event = "mongo_disconnect_error", error = %err, "mongo disconnect error"),
    }

    info!(event = "shutdown_complete", "shutdown complete");
    report
}

/// Connects everything described by `config` and serves until SIGINT/SIGTERM.
pub async fn run(config: Config, started_at: Instant) -> Result<()> {
    info!(
        event = "startup",
        mongo_db = %config.mongo_db,
        http_port = config.http_port,
        "configuration loaded"
    );

    let gateway = Arc::new(
        Gateway::connect(&config.mongo_uri, &config.mongo_db, timeouts::MONGO_CONNECT)
            .await
            .context("mongo connection error")?,
    );
    info!(event = "mongo_connect", mongo_db = %config.mongo_db, "connected to mongo");

    if let Err(err) = prepare_store(&gateway, config.bot_owner_id).await {
        let _ = gateway.close(timeouts::MONGO_DISCONNECT).await;
        return Err(err);
    }

    let users = Arc::new(gateway.users());
    let groups = Arc::new(gateway.groups());
    let pinger: Arc<dyn Pinger> = gateway.clone();

    let commands = CommandHandlers::new(
        config.bot_owner_id,
        config.app_env,
        pinger.clone(),
        UserRepository::new(users.clone()),
        StatsProvider::new(users.clone(), groups.clone()),
    )
    .with_started_at(started_at);
    let dispatcher = UpdateDispatcher::new(
        UserRegistrar::new(users),
        GroupRegistrar::new(groups),
        Arc::new(commands),
    );

    let client = TelegramClient::new(&config.telegram_token, Arc::new(dispatcher));
    info!(event = "telegram_ready", "telegram client initialized");
    client.register_commands().await;

    let cancel = CancellationToken::new();
    let mut health = spawn_health_server(config.http_port, pinger, cancel.clone());

    supervise(
        Arc::new(client),
        gateway.as_ref(),
        shutdown_signal(),
        ShutdownTimeouts::default(),
        cancel,
    )
    .await;

    if tokio::time::timeout(timeouts::HEALTH_SHUTDOWN, &mut health).await.is_err() {
        health.abort();
    }

    Ok(())
}

/// Runs the health server in the background. A failure (typically the port
/// being taken) is logged when it happens and never stops the bot.
pub fn spawn_health_server(port: u16, pinger: Arc<dyn Pinger>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            if let Err(err) = start_health_server(port, pinger, cancel).await {
                warn!(event = "health_error", port, error = %err, "health server failed");
            }
        }
        .in_current_span(),
    )
}

/// Index creation and owner bootstrap, in that order.
async fn prepare_store(gateway: &Gateway, owner_id: i64) -> Result<()> {
    ensure_indexes(gateway, timeouts::MONGO_INDEX)
        .await
        .context("mongo index setup error")?;
    info!(event = "mongo_indexes", "ensured base mongo indexes");

    let users = Arc::new(gateway.users());
    bounded(
        "ensure owner",
        timeouts::OWNER_BOOTSTRAP,
        OwnerBootstrapper::new(users).ensure_owner(owner_id),
    )
    .await
    .context("owner bootstrap error")?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(event = "shutdown_signal", error = %err, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(event = "shutdown_signal", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
