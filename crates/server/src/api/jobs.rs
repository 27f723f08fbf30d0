//! Batch job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use aqueduct_core::job::{JobFilter, JobKind, JobRun, JobStatus};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing job runs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by stage kind ("clean" or "aggregate")
    pub kind: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of runs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for listing job runs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub runs: Vec<JobRun>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for running the clean stage (which may chain into aggregate)
#[derive(Debug, Serialize)]
pub struct ChainRunResponse {
    pub clean: JobRun,
    /// Present only when the chain trigger fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<JobRun>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn parse_kind(value: &str) -> Option<JobKind> {
    match value {
        "clean" => Some(JobKind::Clean),
        "aggregate" => Some(JobKind::Aggregate),
        _ => None,
    }
}

fn parse_status(value: &str) -> Option<JobStatus> {
    match value {
        "running" => Some(JobStatus::Running),
        "succeeded" => Some(JobStatus::Succeeded),
        "failed" => Some(JobStatus::Failed),
        "stopped" => Some(JobStatus::Stopped),
        _ => None,
    }
}

fn bad_request(error: impl Into<String>) -> (StatusCode, Json<JobErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(JobErrorResponse {
            error: error.into(),
        }),
    )
}

fn internal_error(error: impl ToString) -> (StatusCode, Json<JobErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(JobErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Run the clean stage. On success the chain trigger starts the aggregate
/// stage; the response carries both runs.
pub async fn run_clean(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChainRunResponse>, (StatusCode, Json<JobErrorResponse>)> {
    let (clean, aggregate) = state.runner().run_chain().await.map_err(internal_error)?;
    Ok(Json(ChainRunResponse { clean, aggregate }))
}

/// Run the aggregate stage alone (operator re-run).
pub async fn run_aggregate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobRun>, (StatusCode, Json<JobErrorResponse>)> {
    let run = state.runner().run_aggregate().await.map_err(internal_error)?;
    Ok(Json(run))
}

/// List job runs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, (StatusCode, Json<JobErrorResponse>)> {
    let mut filter = JobFilter::new();

    if let Some(ref kind) = params.kind {
        let kind = parse_kind(kind).ok_or_else(|| bad_request(format!("unknown kind: {kind}")))?;
        filter = filter.with_kind(kind);
    }
    if let Some(ref status) = params.status {
        let status =
            parse_status(status).ok_or_else(|| bad_request(format!("unknown status: {status}")))?;
        filter = filter.with_status(status);
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    filter = filter.with_limit(limit).with_offset(offset);

    let total = state.jobs().count(&filter).map_err(internal_error)?;
    let runs = state.jobs().list(&filter).map_err(internal_error)?;

    Ok(Json(ListJobsResponse {
        runs,
        total,
        limit,
        offset,
    }))
}

/// Get one job run
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRun>, (StatusCode, Json<JobErrorResponse>)> {
    match state.jobs().get(&id) {
        Ok(Some(run)) => Ok(Json(run)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(JobErrorResponse {
                error: format!("job run not found: {id}"),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}
