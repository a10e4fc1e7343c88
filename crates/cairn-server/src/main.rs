//! cairn-blockd: standalone block server.
//!
//! Configuration comes from the YAML file named by `CAIRN_CONFIG` (if
//! set), then `CAIRN_BIND`, `CAIRN_DATA_DIR` and `CAIRN_AUTHENTICATOR`
//! override the server section. Without a data directory blocks live in
//! memory and are lost on restart.

use std::path::PathBuf;

use anyhow::Context;
use cairn_core::CairnConfig;
use cairn_server::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var_os("CAIRN_CONFIG") {
        Some(path) => CairnConfig::load(&PathBuf::from(path))?,
        None => CairnConfig::default(),
    };
    config.server.apply_env();
    if config.server.authenticator.is_empty() {
        tracing::warn!("no authenticator configured; all uploads will be rejected");
    }

    let state = AppState::open(&config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!("cairn-blockd listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
