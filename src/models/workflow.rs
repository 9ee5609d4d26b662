use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow_step::WorkflowStep;
use crate::state_machine::states::{StepStatus, WorkflowStatus};

/// Workflow represents one linear approval run over an ordered list of steps.
///
/// `current_step_index` is a 0-based index into `step_ids` and is only ever
/// rewritten inside a committed transition:
/// - `pending`: 0, nothing active yet
/// - `in_progress`: the sole `in_progress` step
/// - `completed`: past-the-end (`step_ids.len()`)
/// - `rejected`: frozen at the rejecting step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: Uuid,
    /// Human-facing identifier, immutable once assigned
    pub reference_code: String,
    pub document_id: Uuid,
    /// Step identifiers ordered by `step_order`
    pub step_ids: Vec<Uuid>,
    pub current_step_index: i32,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of times the workflow was sent back to its first step
    pub return_count: i32,
    /// Number of decisive ledger entries committed so far
    pub decision_count: i64,
    /// Optimistic concurrency token, bumped by every committed mutation
    pub lock_version: i64,
}

impl Workflow {
    /// Step order of the active step, if the workflow is in progress
    pub fn active_step_order(&self) -> Option<i32> {
        if self.status.is_active() {
            Some(self.current_step_index + 1)
        } else {
            None
        }
    }

    pub fn step_count(&self) -> usize {
        self.step_ids.len()
    }
}

/// A workflow together with its steps, ordered by `step_order`.
///
/// Snapshots are what stores hand out and what the transition engine plans against;
/// they are plain copies, never live views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowSnapshot {
    pub fn step_by_order(&self, step_order: i32) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_order == step_order)
    }

    pub fn current_step(&self) -> Option<&WorkflowStep> {
        if !self.workflow.status.is_active() {
            return None;
        }
        usize::try_from(self.workflow.current_step_index)
            .ok()
            .and_then(|idx| self.steps.get(idx))
    }

    /// Verify the linear-ordering invariants.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let wf = &self.workflow;
        let active: Vec<&WorkflowStep> = self.steps.iter().filter(|s| s.status.is_active()).collect();

        if active.len() > 1 {
            return Err(format!(
                "workflow {} has {} in_progress steps",
                wf.workflow_id,
                active.len()
            ));
        }

        for (idx, step) in self.steps.iter().enumerate() {
            if step.step_order != idx as i32 + 1 {
                return Err(format!(
                    "step at position {idx} has step_order {}",
                    step.step_order
                ));
            }
        }

        let idx = wf.current_step_index;
        match wf.status {
            WorkflowStatus::Pending => {
                if let Some(step) = self.steps.iter().find(|s| s.status != StepStatus::NotStarted) {
                    return Err(format!(
                        "pending workflow has step {} in {}",
                        step.step_order, step.status
                    ));
                }
            }
            WorkflowStatus::InProgress => {
                let Some(current) = active.first() else {
                    return Err("in_progress workflow has no active step".to_string());
                };
                if current.step_order != idx + 1 {
                    return Err(format!(
                        "pointer at index {idx} but step {} is active",
                        current.step_order
                    ));
                }
                for step in &self.steps {
                    let expected_ok = if step.step_order < current.step_order {
                        step.status == StepStatus::Approved
                    } else if step.step_order > current.step_order {
                        step.status == StepStatus::NotStarted
                    } else {
                        true
                    };
                    if !expected_ok {
                        return Err(format!(
                            "step {} is {} while step {} is active",
                            step.step_order, step.status, current.step_order
                        ));
                    }
                }
            }
            WorkflowStatus::Completed => {
                if idx as usize != self.steps.len() {
                    return Err(format!("completed workflow pointer at {idx}, not past-the-end"));
                }
                if let Some(step) = self.steps.iter().find(|s| s.status != StepStatus::Approved) {
                    return Err(format!(
                        "completed workflow has step {} in {}",
                        step.step_order, step.status
                    ));
                }
                if wf.completed_at.is_none() {
                    return Err("completed workflow has no completed_at".to_string());
                }
            }
            WorkflowStatus::Rejected => {
                let rejected_order = idx + 1;
                for step in &self.steps {
                    let expected = if step.step_order < rejected_order {
                        StepStatus::Approved
                    } else if step.step_order == rejected_order {
                        StepStatus::Rejected
                    } else {
                        StepStatus::Skipped
                    };
                    if step.status != expected {
                        return Err(format!(
                            "rejected workflow has step {} in {}, expected {expected}",
                            step.step_order, step.status
                        ));
                    }
                }
                if wf.completed_at.is_none() {
                    return Err("rejected workflow has no completed_at".to_string());
                }
            }
        }

        Ok(())
    }
}
