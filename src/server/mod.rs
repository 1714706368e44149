//! HTTP surface for the renewal workflows.

mod router;
mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use router::build_router;
pub use state::{ServeHealth, ServeHealthSnapshot, ServeState};

/// Serves until ctrl-c, then stops reporting ready and drains in-flight requests.
pub async fn serve(state: ServeState, addr: SocketAddr) -> Result<()> {
    crate::metrics::register_metrics();
    let health = state.health.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "renewal service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(?err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            health.mark_unready();
            info!("shutdown requested, draining in-flight renewals");
        })
        .await
        .context("renewal service exited with error")
}
