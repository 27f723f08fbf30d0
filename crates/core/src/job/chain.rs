//! Chain trigger: conditional start of the aggregate stage.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{JobRun, JobStatus};

/// State of the trigger for one upstream run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// No firing has happened for this run. Permanent for runs that ended in
    /// any status other than succeeded.
    Waiting,
    /// The downstream stage was started for this run.
    Fired,
}

/// Outcome of evaluating one completed upstream run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Start the downstream stage now, exactly once.
    Fire,
    /// Do not start the downstream stage.
    Skip { reason: String },
}

/// Conditional dependency between the clean and aggregate stages.
///
/// For each upstream run the trigger moves `Waiting -> Fired` at most once,
/// and only when that run's terminal status is succeeded. Failed or stopped
/// runs leave the trigger `Waiting` permanently for that run; the operator
/// re-runs stage 1 manually and a fresh run gets a fresh trigger entry.
#[derive(Debug, Default)]
pub struct ChainTrigger {
    states: Mutex<HashMap<String, TriggerState>>,
}

impl ChainTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a completed upstream run.
    ///
    /// Fires at most once per run id; duplicate evaluations of the same run
    /// skip.
    pub fn evaluate(&self, run: &JobRun) -> TriggerDecision {
        if !run.status.is_terminal() {
            return TriggerDecision::Skip {
                reason: format!("upstream run {} is still running", run.id),
            };
        }

        let mut states = self.states.lock().unwrap();

        if states.get(&run.id) == Some(&TriggerState::Fired) {
            debug!(run_id = %run.id, "Trigger already fired for run");
            return TriggerDecision::Skip {
                reason: format!("already fired for run {}", run.id),
            };
        }

        if run.status == JobStatus::Succeeded {
            states.insert(run.id.clone(), TriggerState::Fired);
            info!(run_id = %run.id, "Chain trigger fired");
            TriggerDecision::Fire
        } else {
            states.insert(run.id.clone(), TriggerState::Waiting);
            TriggerDecision::Skip {
                reason: format!(
                    "upstream run {} finished with status {}",
                    run.id,
                    run.status.as_str()
                ),
            }
        }
    }

    /// Current trigger state for an upstream run.
    pub fn state_for(&self, run_id: &str) -> TriggerState {
        self.states
            .lock()
            .unwrap()
            .get(run_id)
            .copied()
            .unwrap_or(TriggerState::Waiting)
    }
}
