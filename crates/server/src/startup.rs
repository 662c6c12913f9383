use std::future::Future;

use axum::Router;
use configs::AppConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::metrics;
use crate::routes::{self, ServerState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Open the configured record store.
pub async fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    cfg.storage
        .validate()
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let store = service::open(&cfg.storage).await?;
    Ok(ServerState { store })
}

pub fn build_app(state: ServerState) -> Router {
    routes::build_router(state, build_cors())
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_app(state);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("server stopped accepting connections");
    Ok(())
}

/// Public entry: open the store, bind the listeners and serve until `shutdown`.
pub async fn run<F>(cfg: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    metrics::init();
    let state = build_state(&cfg).await?;

    if let Some(admin_addr) = &cfg.server.admin_addr {
        common::admin_http::spawn_admin_server(admin_addr, metrics::encode_metrics).await?;
    }

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| StartupError::Runtime(format!("cannot bind {addr}: {e}")))?;
    info!(
        addr = %listener.local_addr()?,
        backend = state.store.backend(),
        "food inventory server listening"
    );
    serve(listener, state, shutdown).await
}
