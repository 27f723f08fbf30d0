use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{audit, executions, handlers, jobs, store};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Store
        .route("/store", get(handlers::get_store_info))
        .route("/store/objects", get(store::list_objects))
        // Batch jobs
        .route("/jobs/clean", post(jobs::run_clean))
        .route("/jobs/aggregate", post(jobs::run_aggregate))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        // Workflow executions
        .route("/executions", get(executions::list_executions))
        .route("/executions", post(executions::start_execution))
        .route("/executions/{id}", get(executions::get_execution))
        .route("/orchestrator/status", get(executions::orchestrator_status))
        // Audit
        .route("/audit", get(audit::query_audit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            super::middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
}
