//! Workflow execution API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use aqueduct_core::workflow::{Execution, ExecutionFilter, OrchestratorStatus};

use crate::state::AppState;

/// Maximum allowed limit for execution queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for execution queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing executions
#[derive(Debug, Deserialize)]
pub struct ListExecutionsParams {
    /// Filter by state type ("train", "succeeded", ...)
    pub state: Option<String>,
    /// Maximum number of executions to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for listing executions
#[derive(Debug, Serialize)]
pub struct ListExecutionsResponse {
    pub executions: Vec<Execution>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ExecutionErrorResponse {
    pub error: String,
}

fn internal_error(error: impl ToString) -> (StatusCode, Json<ExecutionErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ExecutionErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// List executions
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListExecutionsParams>,
) -> Result<Json<ListExecutionsResponse>, (StatusCode, Json<ExecutionErrorResponse>)> {
    let mut filter = ExecutionFilter::new();
    if let Some(ref state_type) = params.state {
        filter = filter.with_state(state_type);
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    filter = filter.with_limit(limit).with_offset(offset);

    let total = state.executions().count(&filter).map_err(internal_error)?;
    let executions = state.executions().list(&filter).map_err(internal_error)?;

    Ok(Json(ListExecutionsResponse {
        executions,
        total,
        limit,
        offset,
    }))
}

/// Get one execution
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Execution>, (StatusCode, Json<ExecutionErrorResponse>)> {
    match state.executions().get(&id) {
        Ok(Some(execution)) => Ok(Json(execution)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ExecutionErrorResponse {
                error: format!("execution not found: {id}"),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// Manually start a new execution (operator re-trigger)
pub async fn start_execution(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Execution>), (StatusCode, Json<ExecutionErrorResponse>)> {
    let Some(orchestrator) = state.orchestrator() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ExecutionErrorResponse {
                error: "no training runtime configured".to_string(),
            }),
        ));
    };

    match orchestrator.start_execution().await {
        Ok(execution) => Ok((StatusCode::CREATED, Json(execution))),
        Err(e) => Err(internal_error(e)),
    }
}

/// Orchestrator status
pub async fn orchestrator_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    match state.orchestrator() {
        Some(orchestrator) => Json(orchestrator.status().await),
        None => Json(OrchestratorStatus::default()),
    }
}
