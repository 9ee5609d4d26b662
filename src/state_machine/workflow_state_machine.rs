//! Workflow-level transition rules.
//!
//! Planning is pure: it takes a snapshot, applies one start or one decision, and
//! returns the resulting snapshot together with what changed. Nothing here touches
//! storage, so the same rules drive both the live engine and ledger replay.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::events::{DecisionAction, StepEvent};
use super::states::{StepStatus, WorkflowStatus};
use super::step_state_machine::StepStateMachine;
use crate::error::{Result, SignoffError};
use crate::models::{WorkflowSnapshot, WorkflowStep};
use crate::step_store::{advance, Advance};

/// What a planned transition does to the workflow as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEffect {
    /// The workflow was started and its first step activated
    Started { first_step_order: i32 },
    /// The decided step was approved and the next step activated
    Advanced { next_step_order: i32 },
    /// The last step was approved
    Completed,
    /// The decided step was rejected; the listed later steps were skipped
    Rejected { skipped_step_orders: Vec<i32> },
    /// The workflow was sent back to its first step
    Returned { returned_from_step_order: i32 },
}

/// Result of planning a transition against a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// `lock_version` the snapshot was planned against
    pub expected_lock_version: i64,
    /// The step the transition was conditioned on, with its expected prior status
    pub target_step_id: Uuid,
    pub expected_step_status: StepStatus,
    /// Full post-transition state
    pub after: WorkflowSnapshot,
    /// Steps whose row differs from the planned-against snapshot
    pub changed_steps: Vec<WorkflowStep>,
    pub effect: TransitionEffect,
}

impl TransitionPlan {
    pub fn target_step(&self) -> Option<&WorkflowStep> {
        self.after
            .steps
            .iter()
            .find(|s| s.step_id == self.target_step_id)
    }
}

/// Workflow state machine: start and decision planning
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    /// Plan the `pending -> in_progress` transition
    pub fn plan_start(snapshot: &WorkflowSnapshot, now: DateTime<Utc>) -> Result<TransitionPlan> {
        let workflow = &snapshot.workflow;
        if workflow.status != WorkflowStatus::Pending {
            return Err(SignoffError::AlreadyStarted {
                workflow_id: workflow.workflow_id,
                status: workflow.status,
            });
        }

        let mut after = snapshot.clone();
        let first = after.steps.first_mut().ok_or_else(|| {
            SignoffError::validation(format!("workflow {} has no steps", workflow.workflow_id))
        })?;
        let target_step_id = first.step_id;
        let first_step_order = first.step_order;
        StepStateMachine::apply(first, StepEvent::Activate, now)?;

        after.workflow.status = WorkflowStatus::InProgress;
        after.workflow.current_step_index = 0;
        after.workflow.started_at = Some(now);
        after.workflow.lock_version += 1;

        Ok(Self::finish(
            snapshot,
            after,
            target_step_id,
            StepStatus::NotStarted,
            TransitionEffect::Started { first_step_order },
        ))
    }

    /// Plan the effect of `action` on the workflow's active step.
    ///
    /// Callers are expected to have run the decision guards already; the checks
    /// here only protect the state machine itself.
    pub fn plan_decision(
        snapshot: &WorkflowSnapshot,
        action: DecisionAction,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan> {
        let workflow = &snapshot.workflow;
        if !workflow.status.is_active() {
            return Err(SignoffError::WorkflowNotActive {
                workflow_id: workflow.workflow_id,
                status: workflow.status,
            });
        }

        let current_index = usize::try_from(workflow.current_step_index)
            .map_err(|_| SignoffError::Internal("negative step pointer".into()))?;
        let current = snapshot
            .steps
            .get(current_index)
            .ok_or_else(|| SignoffError::Internal("step pointer out of range".into()))?;
        if current.status != StepStatus::InProgress {
            return Err(SignoffError::StepAlreadyDecided {
                workflow_id: workflow.workflow_id,
                step_order: current.step_order,
                status: current.status,
            });
        }
        let target_step_id = current.step_id;
        let decided_order = current.step_order;

        let mut after = snapshot.clone();
        StepStateMachine::apply(
            &mut after.steps[current_index],
            StepEvent::Decide(action),
            now,
        )?;

        let effect = match action {
            DecisionAction::Approved | DecisionAction::Signed => match advance(&mut after, now)? {
                Advance::Activated(next) => TransitionEffect::Advanced {
                    next_step_order: next.step_order,
                },
                Advance::WorkflowComplete => {
                    after.workflow.status = WorkflowStatus::Completed;
                    after.workflow.completed_at = Some(now);
                    TransitionEffect::Completed
                }
            },
            DecisionAction::Rejected => {
                let mut skipped_step_orders = Vec::new();
                for step in after.steps.iter_mut().skip(current_index + 1) {
                    StepStateMachine::apply(step, StepEvent::Skip, now)?;
                    skipped_step_orders.push(step.step_order);
                }
                after.workflow.status = WorkflowStatus::Rejected;
                after.workflow.completed_at = Some(now);
                TransitionEffect::Rejected {
                    skipped_step_orders,
                }
            }
            DecisionAction::Returned => {
                // Superseded outcomes are reset; their history stays in the ledger
                for (idx, step) in after.steps.iter_mut().enumerate() {
                    if idx != current_index {
                        StepStateMachine::apply(step, StepEvent::Reset, now)?;
                    }
                }
                StepStateMachine::apply(&mut after.steps[0], StepEvent::Activate, now)?;
                after.workflow.current_step_index = 0;
                after.workflow.return_count += 1;
                TransitionEffect::Returned {
                    returned_from_step_order: decided_order,
                }
            }
        };

        after.workflow.decision_count += 1;
        after.workflow.lock_version += 1;

        Ok(Self::finish(
            snapshot,
            after,
            target_step_id,
            StepStatus::InProgress,
            effect,
        ))
    }

    fn finish(
        before: &WorkflowSnapshot,
        after: WorkflowSnapshot,
        target_step_id: Uuid,
        expected_step_status: StepStatus,
        effect: TransitionEffect,
    ) -> TransitionPlan {
        let changed_steps = after
            .steps
            .iter()
            .zip(before.steps.iter())
            .filter(|(new, old)| new != old)
            .map(|(new, _)| new.clone())
            .collect();

        TransitionPlan {
            expected_lock_version: before.workflow.lock_version,
            target_step_id,
            expected_step_status,
            after,
            changed_steps,
            effect,
        }
    }
}
