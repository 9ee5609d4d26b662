use chrono::{DateTime, Utc};

use super::errors::{invalid_transition, StateMachineResult};
use super::events::{DecisionAction, StepEvent};
use super::states::StepStatus;
use crate::models::WorkflowStep;

/// Transition table for a single step.
///
/// The table is deliberately small: a step is entered once per round, decided once,
/// and only a return (or a rejection upstream) moves it back out of its resting state.
pub struct StepStateMachine;

impl StepStateMachine {
    /// Determine the target status for `event` from `current`
    pub fn determine_target_state(
        current: StepStatus,
        event: StepEvent,
    ) -> StateMachineResult<StepStatus> {
        let target = match (current, event) {
            (StepStatus::NotStarted, StepEvent::Activate) => StepStatus::InProgress,

            (StepStatus::InProgress, StepEvent::Decide(action)) => match action {
                DecisionAction::Approved | DecisionAction::Signed => StepStatus::Approved,
                DecisionAction::Rejected => StepStatus::Rejected,
                DecisionAction::Returned => StepStatus::NotStarted,
            },

            (StepStatus::NotStarted, StepEvent::Skip) => StepStatus::Skipped,

            (StepStatus::NotStarted | StepStatus::Approved, StepEvent::Reset) => {
                StepStatus::NotStarted
            }

            (from, event) => return Err(invalid_transition(from, event.event_type())),
        };

        Ok(target)
    }

    /// Apply `event` to `step`, maintaining its timestamps
    pub fn apply(
        step: &mut WorkflowStep,
        event: StepEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<StepStatus> {
        let target = Self::determine_target_state(step.status, event)?;

        match event {
            StepEvent::Activate => {
                step.started_at = Some(now);
                step.completed_at = None;
            }
            StepEvent::Decide(DecisionAction::Returned) => {
                step.completed_at = Some(now);
                step.return_count += 1;
            }
            StepEvent::Decide(_) => {
                step.completed_at = Some(now);
            }
            StepEvent::Skip => {}
            StepEvent::Reset => {
                step.started_at = None;
                step.completed_at = None;
            }
        }

        step.status = target;
        Ok(target)
    }
}
