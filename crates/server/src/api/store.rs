//! Object store API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use aqueduct_core::store::{ObjectMeta, ObjectStore, ALL_PREFIXES};

use crate::state::AppState;

/// Query parameters for listing objects
#[derive(Debug, Deserialize)]
pub struct ListObjectsParams {
    /// Key prefix to list under; must fall under one of the fixed prefixes.
    pub prefix: String,
}

/// Response for listing objects
#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectMeta>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct StoreErrorResponse {
    pub error: String,
}

/// List objects under one of the fixed prefixes
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Json<ListObjectsResponse>, (StatusCode, Json<StoreErrorResponse>)> {
    if !ALL_PREFIXES
        .iter()
        .any(|prefix| params.prefix.starts_with(prefix))
    {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StoreErrorResponse {
                error: format!(
                    "prefix must fall under one of {}",
                    ALL_PREFIXES.join(", ")
                ),
            }),
        ));
    }

    match state.store().list(&params.prefix).await {
        Ok(objects) => Ok(Json(ListObjectsResponse {
            total: objects.len(),
            objects,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StoreErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
