mod backend;
mod config;
mod db;
mod error;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::backend::AppState;
use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "info,nb_core=info,nb_app=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!(
        upstream = %config.upstream_base_url,
        fallback = config.fallback_enabled,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    let state = Arc::new(AppState::from_config(&config));
    backend::serve(&config, state).await
}
