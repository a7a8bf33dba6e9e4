use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{ProvisionState, TransitionAction};

/// Per-invocation bookkeeping for one drive of one node.
///
/// Created when a workflow starts and discarded when it returns; nothing
/// here is persisted.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub node_id: String,
    pub goal: TransitionAction,
    pub has_clean_steps: bool,
    pub has_service_steps: bool,
    /// Recovery actions still allowed before a failure state becomes fatal.
    pub recovery_budget: u32,
    pub recoveries_used: u32,
    /// Set once a clean/inspect/service request has been accepted, so the
    /// planner stops routing the node back through `manage`.
    pub operation_started: bool,
    pub attempts: u32,
    pub actions_issued: Vec<TransitionAction>,
    pub state_history: Vec<ProvisionState>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(node_id: impl Into<String>, goal: TransitionAction, recovery_budget: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id: node_id.into(),
            goal,
            has_clean_steps: false,
            has_service_steps: false,
            recovery_budget,
            recoveries_used: 0,
            operation_started: false,
            attempts: 0,
            actions_issued: Vec::new(),
            state_history: Vec::new(),
            last_error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_steps(mut self, has_clean_steps: bool, has_service_steps: bool) -> Self {
        self.has_clean_steps = has_clean_steps;
        self.has_service_steps = has_service_steps;
        self
    }

    /// Record a freshly fetched state. Consecutive duplicates are collapsed.
    pub fn observe(&mut self, state: ProvisionState, last_error: Option<String>) {
        if self.state_history.last() != Some(&state) {
            self.state_history.push(state);
        }
        self.last_error = last_error.filter(|e| !e.is_empty());
    }

    pub fn last_state(&self) -> Option<ProvisionState> {
        self.state_history.last().copied()
    }

    pub fn record_issued(&mut self, action: TransitionAction, starts_operation: bool) {
        self.actions_issued.push(action);
        if starts_operation {
            self.operation_started = true;
        }
    }
}

/// Summary of a successful workflow, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub node_id: String,
    pub goal: TransitionAction,
    pub final_state: Option<ProvisionState>,
    pub actions_issued: Vec<TransitionAction>,
    pub states_observed: Vec<ProvisionState>,
    pub attempts: u32,
    pub recoveries_used: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl WorkflowReport {
    pub fn from_run(run: &WorkflowRun) -> Self {
        let now = Utc::now();
        let duration = now - run.created_at;

        Self {
            run_id: run.id,
            node_id: run.node_id.clone(),
            goal: run.goal,
            final_state: run.last_state(),
            actions_issued: run.actions_issued.clone(),
            states_observed: run.state_history.clone(),
            attempts: run.attempts,
            recoveries_used: run.recoveries_used,
            started_at: run.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
