//! # Step Store
//!
//! Read access to a workflow's ordered steps, plus the [`advance`] rule that the
//! transition engine applies inside its atomic unit. Callers never mutate steps
//! directly; every write goes through a committed transition.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, SignoffError};
use crate::models::{WorkflowSnapshot, WorkflowStep};
use crate::persistence::WorkflowStore;
use crate::state_machine::errors::internal_error;
use crate::state_machine::events::StepEvent;
use crate::state_machine::states::StepStatus;
use crate::state_machine::step_state_machine::StepStateMachine;

/// Outcome of moving the pointer past an approved step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next step in order is now `in_progress`
    Activated(WorkflowStep),
    /// The approved step was the last one
    WorkflowComplete,
}

#[derive(Clone)]
pub struct StepStore {
    store: Arc<dyn WorkflowStore>,
}

impl StepStore {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn get_step(&self, workflow_id: Uuid, step_order: i32) -> Result<WorkflowStep> {
        let snapshot = self.snapshot(workflow_id).await?;
        snapshot
            .step_by_order(step_order)
            .cloned()
            .ok_or(SignoffError::StepNotFound {
                workflow_id,
                step_order,
            })
    }

    /// All steps of a workflow, ordered by `step_order` ascending
    pub async fn steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>> {
        Ok(self.snapshot(workflow_id).await?.steps)
    }

    async fn snapshot(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.store
            .load_snapshot(workflow_id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound { workflow_id })
    }
}

/// Move the workflow pointer past its current, already approved, step.
///
/// Only the step directly after the approved one can be activated, which keeps
/// every lower-ordered step `approved` before a higher one is entered.
pub fn advance(snapshot: &mut WorkflowSnapshot, now: DateTime<Utc>) -> Result<Advance> {
    let current = usize::try_from(snapshot.workflow.current_step_index)
        .map_err(|_| invariant_violation("negative step pointer"))?;

    match snapshot.steps.get(current) {
        Some(step) if step.status == StepStatus::Approved => {}
        Some(step) => {
            return Err(invariant_violation(format!(
                "cannot advance past step {} in {}",
                step.step_order, step.status
            )))
        }
        None => return Err(invariant_violation("step pointer out of range")),
    }

    let next = current + 1;
    snapshot.workflow.current_step_index = next as i32;

    match snapshot.steps.get_mut(next) {
        Some(step) => {
            StepStateMachine::apply(step, StepEvent::Activate, now)?;
            Ok(Advance::Activated(step.clone()))
        }
        None => Ok(Advance::WorkflowComplete),
    }
}

fn invariant_violation(msg: impl Into<String>) -> SignoffError {
    internal_error(msg).into()
}
