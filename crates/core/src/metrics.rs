//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batch jobs (runs, durations, record counts)
//! - Chain trigger (fired / skipped)
//! - Change notifier (signals emitted)
//! - Workflow executions (outcomes, step durations, deploys)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Batch jobs
// =============================================================================

/// Job runs total by kind and terminal status.
pub static JOB_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("aqueduct_job_runs_total", "Total batch job runs"),
        &["kind", "status"], // kind: "clean"/"aggregate", status: "succeeded"/"failed"
    )
    .unwrap()
});

/// Job duration in seconds by kind.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("aqueduct_job_duration_seconds", "Duration of batch jobs")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["kind"],
    )
    .unwrap()
});

/// Records dropped by the clean stage.
pub static RECORDS_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "aqueduct_records_dropped_total",
        "Malformed raw records dropped by the clean stage",
    )
    .unwrap()
});

// =============================================================================
// Chain trigger
// =============================================================================

/// Chain trigger firings.
pub static TRIGGER_FIRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "aqueduct_trigger_fired_total",
        "Chain trigger firings (stage 2 started)",
    )
    .unwrap()
});

/// Chain trigger skips by upstream status.
pub static TRIGGER_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "aqueduct_trigger_skipped_total",
            "Chain trigger evaluations that did not fire",
        ),
        &["upstream_status"],
    )
    .unwrap()
});

// =============================================================================
// Change notifier
// =============================================================================

/// Start signals emitted to the orchestrator.
pub static SIGNALS_EMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "aqueduct_signals_emitted_total",
        "Start signals emitted by the change notifier",
    )
    .unwrap()
});

// =============================================================================
// Workflow executions
// =============================================================================

/// Workflow executions by outcome.
pub static EXECUTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("aqueduct_executions_total", "Workflow executions"),
        &["outcome"], // "succeeded", "failed"
    )
    .unwrap()
});

/// Per-step duration in seconds.
pub static EXECUTION_STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "aqueduct_execution_step_duration_seconds",
            "Duration of workflow execution steps",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 600.0]),
        &["step"], // "train", "register_model", "configure_hosting", "deploy_endpoint"
    )
    .unwrap()
});

/// Endpoint deployments total.
pub static ENDPOINT_DEPLOYS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "aqueduct_endpoint_deploys_total",
        "Endpoint create-or-update deployments",
    )
    .unwrap()
});

/// Register all core metrics with a Prometheus registry.
pub fn register_core_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(JOB_RUNS_TOTAL.clone()))?;
    registry.register(Box::new(JOB_DURATION.clone()))?;
    registry.register(Box::new(RECORDS_DROPPED_TOTAL.clone()))?;
    registry.register(Box::new(TRIGGER_FIRED_TOTAL.clone()))?;
    registry.register(Box::new(TRIGGER_SKIPPED_TOTAL.clone()))?;
    registry.register(Box::new(SIGNALS_EMITTED_TOTAL.clone()))?;
    registry.register(Box::new(EXECUTIONS_TOTAL.clone()))?;
    registry.register(Box::new(EXECUTION_STEP_DURATION.clone()))?;
    registry.register(Box::new(ENDPOINT_DEPLOYS_TOTAL.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_core_metrics() {
        let registry = prometheus::Registry::new();
        register_core_metrics(&registry).unwrap();

        JOB_RUNS_TOTAL.with_label_values(&["clean", "succeeded"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "aqueduct_job_runs_total"));
    }
}
