use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Batch job lifecycle
    JobStarted {
        job_id: String,
        kind: String,
        input_prefix: String,
        output_prefix: String,
        engine: String,
    },
    JobCompleted {
        job_id: String,
        kind: String,
        records_in: u64,
        records_out: u64,
        records_dropped: u64,
        duration_ms: u64,
    },
    JobFailed {
        job_id: String,
        kind: String,
        error: String,
    },

    // Chain trigger
    TriggerFired {
        upstream_job_id: String,
        downstream_kind: String,
    },
    TriggerSkipped {
        upstream_job_id: String,
        upstream_status: String,
    },

    // Change notifier
    StartSignalEmitted {
        key: String,
    },

    // Workflow executions
    ExecutionStarted {
        execution_id: String,
    },
    ExecutionStateChanged {
        execution_id: String,
        from_state: String,
        to_state: String,
        reason: Option<String>,
    },
    TrainingJobSubmitted {
        execution_id: String,
        training_job_id: String,
        input_prefix: String,
        max_runtime_secs: u64,
    },
    ModelRegistered {
        execution_id: String,
        model_id: String,
        artifact_location: String,
    },
    EndpointDeployed {
        execution_id: String,
        endpoint_name: String,
        config_id: String,
    },
}

impl AuditEvent {
    /// Stable string tag for storage and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::ServiceStarted { .. } => "service_started",
            AuditEvent::ServiceStopped { .. } => "service_stopped",
            AuditEvent::JobStarted { .. } => "job_started",
            AuditEvent::JobCompleted { .. } => "job_completed",
            AuditEvent::JobFailed { .. } => "job_failed",
            AuditEvent::TriggerFired { .. } => "trigger_fired",
            AuditEvent::TriggerSkipped { .. } => "trigger_skipped",
            AuditEvent::StartSignalEmitted { .. } => "start_signal_emitted",
            AuditEvent::ExecutionStarted { .. } => "execution_started",
            AuditEvent::ExecutionStateChanged { .. } => "execution_state_changed",
            AuditEvent::TrainingJobSubmitted { .. } => "training_job_submitted",
            AuditEvent::ModelRegistered { .. } => "model_registered",
            AuditEvent::EndpointDeployed { .. } => "endpoint_deployed",
        }
    }

    /// Id of the job or execution this event concerns, if any.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            AuditEvent::ServiceStarted { .. } | AuditEvent::ServiceStopped { .. } => None,
            AuditEvent::JobStarted { job_id, .. }
            | AuditEvent::JobCompleted { job_id, .. }
            | AuditEvent::JobFailed { job_id, .. } => Some(job_id),
            AuditEvent::TriggerFired {
                upstream_job_id, ..
            }
            | AuditEvent::TriggerSkipped {
                upstream_job_id, ..
            } => Some(upstream_job_id),
            AuditEvent::StartSignalEmitted { key } => Some(key),
            AuditEvent::ExecutionStarted { execution_id }
            | AuditEvent::ExecutionStateChanged { execution_id, .. }
            | AuditEvent::TrainingJobSubmitted { execution_id, .. }
            | AuditEvent::ModelRegistered { execution_id, .. }
            | AuditEvent::EndpointDeployed { execution_id, .. } => Some(execution_id),
        }
    }
}

/// A stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Database id (0 until inserted)
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// Job or execution id the event concerns, if any
    pub subject_id: Option<String>,
    pub data: AuditEvent,
}
