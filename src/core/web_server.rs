//! Health endpoint for container probes.
//!
//! Serves `GET /healthz` on HTTP_PORT alongside Telegram polling. The
//! response is always 200; a failed store ping turns the body into
//! `{"status":"degraded","mongo":"error"}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::config::timeouts;
use crate::storage::ports::{Pinger, bounded};

/// Shared state for the health server.
#[derive(Clone)]
struct HealthState {
    pinger: Arc<dyn Pinger>,
}

/// Body of `GET /healthz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongo: Option<&'static str>,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self { status: "ok", mongo: None }
    }

    pub fn degraded() -> Self {
        Self {
            status: "degraded",
            mongo: Some("error"),
        }
    }
}

pub fn health_router(pinger: Arc<dyn Pinger>) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .with_state(HealthState { pinger })
}

/// Serves the health endpoint until `cancel` fires.
pub async fn start_health_server(port: u16, pinger: Arc<dyn Pinger>, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(event = "health_listen", addr = %addr, "starting health server");

    axum::serve(listener, health_router(pinger))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!(event = "health_stopped", "health server stopped");
    Ok(())
}

/// Pings the store with the health timeout.
pub async fn check_health(pinger: &dyn Pinger) -> HealthStatus {
    match bounded("health ping", timeouts::HEALTH_PING, pinger.ping()).await {
        Ok(()) => HealthStatus::ok(),
        Err(err) => {
            warn!(event = "health_mongo_error", error = %err, "mongo ping failed during health check");
            HealthStatus::degraded()
        }
    }
}

/// GET /healthz
async fn healthz_handler(State(state): State<HealthState>) -> Json<HealthStatus> {
    Json(check_health(state.pinger.as_ref()).await)
}
