// server.rs: axum router and listener bootstrap.

use crate::commands::engram;
use crate::state::EngramState;
use axum::routing::{get, post};
use axum::Router;
use engram_core::atoms::engram_types::AppConfig;
use engram_core::atoms::error::EngramError;
use log::info;
use thiserror::Error;
use tower_http::cors::CorsLayer;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Engram(#[from] EngramError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub fn build_router(state: EngramState) -> Router {
    Router::new()
        .route("/health", get(engram::health))
        .route("/api/engram/fingerprint", get(engram::get_fingerprints))
        .route("/api/engram/invalidate", post(engram::invalidate))
        .route("/api/engram/refresh", post(engram::refresh))
        .route("/api/engram/context", post(engram::context))
        .route("/api/engram/config", get(engram::get_config))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build state from `config` and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = EngramState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("[server] Listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
