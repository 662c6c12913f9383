//! Lightweight admin HTTP listener
//!
//! Exposes `/healthz` and `/metrics` on a separate address, with metrics
//! rendered by the caller.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::types::Health;

async fn healthz() -> Json<Health> {
    Json(Health::ok())
}

/// Bind the admin listener and serve it on the current runtime.
/// Returns the bound address, which differs from `addr` when port 0 is used.
pub async fn spawn_admin_server(
    addr: &str,
    metrics_fn: fn() -> (StatusCode, String),
) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(move || async move { metrics_fn() }));
    info!(addr = %bound, "admin server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "admin server stopped");
        }
    });
    Ok(bound)
}
