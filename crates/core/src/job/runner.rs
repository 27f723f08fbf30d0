//! Job runner: executes transform stages and records their runs.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::TransformConfig;
use crate::metrics;
use crate::store::{ObjectStore, AGGREGATED_PREFIX, CLEAN_PREFIX, RAW_PREFIX};
use crate::transform::{AggregateTransform, CleanTransform, TransformJob};

use super::chain::{ChainTrigger, TriggerDecision};
use super::store::{JobError, JobStore};
use super::types::{JobKind, JobRun, JobStatus};

/// Executes batch transform stages against the object store, recording each
/// invocation as a job run with a terminal status.
///
/// A stage failure is a `Failed` run, not an error from the runner; errors
/// are reserved for the job store itself. Nothing is retried automatically.
pub struct JobRunner {
    store: Arc<dyn ObjectStore>,
    jobs: Arc<dyn JobStore>,
    config: TransformConfig,
    trigger: ChainTrigger,
    audit: Option<AuditHandle>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        jobs: Arc<dyn JobStore>,
        config: TransformConfig,
    ) -> Self {
        Self {
            store,
            jobs,
            config,
            trigger: ChainTrigger::new(),
            audit: None,
        }
    }

    /// Sets the audit handle for logging events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// The chain trigger guarding the aggregate stage.
    pub fn trigger(&self) -> &ChainTrigger {
        &self.trigger
    }

    /// Run the clean stage (raw -> clean) to completion.
    pub async fn run_clean(&self) -> Result<JobRun, JobError> {
        self.run_stage(JobKind::Clean).await
    }

    /// Run the aggregate stage (clean -> aggregated) to completion.
    pub async fn run_aggregate(&self) -> Result<JobRun, JobError> {
        self.run_stage(JobKind::Aggregate).await
    }

    /// Run the clean stage and, if and only if it succeeds, the aggregate
    /// stage. Returns both runs; the second is `None` when the trigger did
    /// not fire.
    pub async fn run_chain(&self) -> Result<(JobRun, Option<JobRun>), JobError> {
        let clean_run = self.run_clean().await?;

        match self.trigger.evaluate(&clean_run) {
            TriggerDecision::Fire => {
                metrics::TRIGGER_FIRED_TOTAL.inc();
                if let Some(ref audit) = self.audit {
                    audit
                        .emit(AuditEvent::TriggerFired {
                            upstream_job_id: clean_run.id.clone(),
                            downstream_kind: JobKind::Aggregate.as_str().to_string(),
                        })
                        .await;
                }
                let aggregate_run = self.run_aggregate().await?;
                Ok((clean_run, Some(aggregate_run)))
            }
            TriggerDecision::Skip { reason } => {
                metrics::TRIGGER_SKIPPED_TOTAL
                    .with_label_values(&[clean_run.status.as_str()])
                    .inc();
                info!(reason = %reason, "Chain trigger did not fire");
                if let Some(ref audit) = self.audit {
                    audit
                        .emit(AuditEvent::TriggerSkipped {
                            upstream_job_id: clean_run.id.clone(),
                            upstream_status: clean_run.status.as_str().to_string(),
                        })
                        .await;
                }
                Ok((clean_run, None))
            }
        }
    }

    async fn run_stage(&self, kind: JobKind) -> Result<JobRun, JobError> {
        let job = match kind {
            JobKind::Clean => TransformJob::new(RAW_PREFIX, CLEAN_PREFIX),
            JobKind::Aggregate => TransformJob::new(CLEAN_PREFIX, AGGREGATED_PREFIX),
        }
        .with_engine(self.config.engine);

        let run = self.jobs.create(kind, job.clone())?;
        info!(run_id = %run.id, kind = kind.as_str(), "Starting batch job");

        if let Some(ref audit) = self.audit {
            audit
                .emit(AuditEvent::JobStarted {
                    job_id: run.id.clone(),
                    kind: kind.as_str().to_string(),
                    input_prefix: job.input_prefix.clone(),
                    output_prefix: job.output_prefix.clone(),
                    engine: job.engine.as_str().to_string(),
                })
                .await;
        }

        let start = Instant::now();
        let result = match kind {
            JobKind::Clean => {
                CleanTransform::new(self.config.malformed_policy)
                    .run(self.store.as_ref(), &job)
                    .await
            }
            JobKind::Aggregate => {
                AggregateTransform::new(self.config.window_secs)
                    .run(self.store.as_ref(), &job)
                    .await
            }
        };
        let duration = start.elapsed();
        metrics::JOB_DURATION
            .with_label_values(&[kind.as_str()])
            .observe(duration.as_secs_f64());

        match result {
            Ok(report) => {
                metrics::JOB_RUNS_TOTAL
                    .with_label_values(&[kind.as_str(), JobStatus::Succeeded.as_str()])
                    .inc();
                if report.records_dropped > 0 {
                    metrics::RECORDS_DROPPED_TOTAL.inc_by(report.records_dropped);
                }
                if let Some(ref audit) = self.audit {
                    audit
                        .emit(AuditEvent::JobCompleted {
                            job_id: run.id.clone(),
                            kind: kind.as_str().to_string(),
                            records_in: report.records_in,
                            records_out: report.records_out,
                            records_dropped: report.records_dropped,
                            duration_ms: duration.as_millis() as u64,
                        })
                        .await;
                }
                self.jobs
                    .finish(&run.id, JobStatus::Succeeded, Some(report), None)
            }
            Err(e) => {
                let error = e.to_string();
                warn!(run_id = %run.id, kind = kind.as_str(), error = %error, "Batch job failed");
                metrics::JOB_RUNS_TOTAL
                    .with_label_values(&[kind.as_str(), JobStatus::Failed.as_str()])
                    .inc();
                if let Some(ref audit) = self.audit {
                    audit
                        .emit(AuditEvent::JobFailed {
                            job_id: run.id.clone(),
                            kind: kind.as_str().to_string(),
                            error: error.clone(),
                        })
                        .await;
                }
                self.jobs
                    .finish(&run.id, JobStatus::Failed, None, Some(error))
            }
        }
    }
}
