//! HTTP broker exposing the SnapSecret submit/access lifecycle.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod state;
pub mod store;
pub mod telemetry;

use anyhow::Context;
use snapsecret_core::{EngineConfig, SnapSecretEngine};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use config::BrokerConfig;
pub use state::AppState;
pub use store::ConfiguredStore;
pub use telemetry::CorrelationId;

pub async fn run(config: BrokerConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;

    let listener = TcpListener::bind(config.http.bind)
        .await
        .with_context(|| format!("failed to bind http listener on {}", config.http.bind))?;
    let http_addr = listener.local_addr()?;
    info!(%http_addr, "http server listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    info!("http server stopped");
    Ok(())
}

pub fn build_state(config: &BrokerConfig) -> anyhow::Result<AppState> {
    let store = store::load_store(&config.store)?;
    Ok(build_state_with_store(store, engine_config(config)))
}

pub fn build_state_with_store(store: ConfiguredStore, engine: EngineConfig) -> AppState {
    AppState::new(SnapSecretEngine::with_config(store, engine))
}

fn engine_config(config: &BrokerConfig) -> EngineConfig {
    EngineConfig {
        operation_timeout: config.engine.operation_timeout(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
