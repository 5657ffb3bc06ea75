mod extract;
mod routes;
mod schemas;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use chrono::Utc;
use nb_core::MemoryProgressStore;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::backend::routes::api_routes;
use crate::config::AppConfig;

pub use state::AppState;

/// Finished progress records are kept this long for late readers.
const PROGRESS_RETENTION: Duration = Duration::from_secs(60 * 60);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

pub async fn serve(config: &AppConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::spawn(prune_progress(state.progress.clone()));

    info!("starting Nano Banana server on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server stopped");
    Ok(())
}

async fn prune_progress(store: Arc<MemoryProgressStore>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(10 * 60));
    loop {
        ticker.tick().await;
        let Ok(retention) = chrono::Duration::from_std(PROGRESS_RETENTION) else {
            return;
        };
        let removed = store.prune_finished(Utc::now() - retention);
        if removed > 0 {
            debug!("pruned {} finished progress records", removed);
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
