// commands/engram.rs: Engram HTTP handlers.
//
//   GET  /health
//   GET  /api/engram/fingerprint
//   POST /api/engram/invalidate  {path}
//   POST /api/engram/refresh
//   POST /api/engram/context     {text}
//   GET  /api/engram/config

use super::{ApiError, ApiResult};
use crate::state::EngramState;
use axum::extract::State;
use axum::Json;
use engram_core::atoms::engram_types::{
    EngramConfig, EngramMetadata, NeuralFingerprint, RefreshReport,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub text: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Map of project path → fingerprint. Populates on first call.
pub async fn get_fingerprints(
    State(state): State<EngramState>,
) -> ApiResult<Json<BTreeMap<String, NeuralFingerprint>>> {
    let service = state.fingerprints();
    let map = tokio::task::spawn_blocking(move || service.fingerprint_map()).await??;
    Ok(Json(map))
}

pub async fn invalidate(
    State(state): State<EngramState>,
    Json(req): Json<InvalidateRequest>,
) -> ApiResult<Json<InvalidateResponse>> {
    if req.path.trim().is_empty() {
        return Err(ApiError::bad_request("path must not be empty"));
    }
    let service = state.fingerprints();
    let key = service.key_for(&req.path);
    let invalidated = service.invalidate(&key);
    log::debug!("[server] invalidate {} → {}", key, invalidated);
    Ok(Json(InvalidateResponse { invalidated }))
}

pub async fn refresh(State(state): State<EngramState>) -> ApiResult<Json<RefreshReport>> {
    let service = state.fingerprints();
    let report = tokio::task::spawn_blocking(move || service.refresh_project()).await??;
    Ok(Json(report))
}

/// The `engram` block a chat-completion response carries for `text`.
pub async fn context(
    State(state): State<EngramState>,
    Json(req): Json<ContextRequest>,
) -> ApiResult<Json<EngramMetadata>> {
    let module = state.module();
    let tokenizer = state.tokenizer();
    let meta = tokio::task::spawn_blocking(move || {
        let tokens = tokenizer.encode(&req.text);
        module.metadata(&tokens)
    })
    .await??;
    Ok(Json(meta))
}

pub async fn get_config(State(state): State<EngramState>) -> Json<EngramConfig> {
    Json(state.config().engram.clone())
}
