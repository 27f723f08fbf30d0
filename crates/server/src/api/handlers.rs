use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use aqueduct_core::store::ALL_PREFIXES;
use aqueduct_core::SanitizedConfig;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// The operator-facing outputs: where the store lives, the data prefixes,
/// and the live endpoint name.
#[derive(Serialize)]
pub struct StoreInfoResponse {
    pub root: String,
    pub prefixes: Vec<String>,
    pub endpoint_name: String,
}

pub async fn get_store_info(State(state): State<Arc<AppState>>) -> Json<StoreInfoResponse> {
    Json(StoreInfoResponse {
        root: state.store().root().display().to_string(),
        prefixes: ALL_PREFIXES.iter().map(|p| p.to_string()).collect(),
        endpoint_name: state.config().orchestrator.endpoint_name.clone(),
    })
}

pub async fn metrics() -> String {
    crate::metrics::render()
}
