// State machine module for the approval workflow
//
// Transition tables are pure functions over snapshots; guards are the async
// preconditions checked before a planned transition is committed.

pub mod errors;
pub mod events;
pub mod guards;
pub mod states;
pub mod step_state_machine;
pub mod workflow_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{DecisionAction, StepEvent};
pub use guards::{decision_guards, DecisionContext, DecisionGuard};
pub use states::{ActionKind, StepStatus, WorkflowStatus};
pub use step_state_machine::StepStateMachine;
pub use workflow_state_machine::{TransitionEffect, TransitionPlan, WorkflowStateMachine};
