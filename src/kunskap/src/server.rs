//! HTTP surface for Pub/Sub push subscriptions (Cloud Run style).
//!
//! `POST /` takes a push envelope and runs one invocation. The response is
//! `204` whatever the invocation's outcome: failures are logged, and a non-2xx
//! answer would only make Pub/Sub redeliver into the same failure. Only a
//! body that is not JSON or has no `message` gets `400`. `GET /health`
//! answers liveness probes.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use query_engine::QueryEngine;
use serde_json::{Value, json};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::{config::Config, handler::handle_trigger, pubsub::PushEnvelope};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Engine every invocation talks to.
    pub engine: Arc<dyn QueryEngine>,
    /// Process-wide configuration.
    pub config: Arc<Config>,
}

/// Routes for the push endpoint and health probe.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(push_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn push_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "rejecting malformed push envelope");
            return StatusCode::BAD_REQUEST;
        }
    };

    let (event, context) = envelope.into_trigger();
    handle_trigger(state.engine.as_ref(), &state.config, &event, &context).await;
    StatusCode::NO_CONTENT
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serves [`router`] on `addr` until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening for push deliveries on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on the first shutdown signal. A handler that cannot be installed
/// is logged and never fires, so it cannot stop the server by itself.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
