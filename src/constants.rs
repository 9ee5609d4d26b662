//! # System Constants
//!
//! Event names published after committed transitions, and status groupings used by
//! queries.

pub use crate::state_machine::{StepStatus, WorkflowStatus};

/// Lifecycle events published after a transition commits
pub mod events {
    // Workflow lifecycle events
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_REJECTED: &str = "workflow.rejected";
    pub const WORKFLOW_RETURNED: &str = "workflow.returned";

    // Step lifecycle events
    pub const STEP_ACTIVATED: &str = "step.activated";
    pub const STEP_APPROVED: &str = "step.approved";
    pub const STEP_REJECTED: &str = "step.rejected";
    pub const STEP_RETURNED: &str = "step.returned";
    pub const STEP_SKIPPED: &str = "step.skipped";
}

/// Status groupings
pub mod status_groups {
    use super::{StepStatus, WorkflowStatus};

    /// Workflows that will never change again
    pub const TERMINAL_WORKFLOW_STATUSES: &[WorkflowStatus] =
        &[WorkflowStatus::Completed, WorkflowStatus::Rejected];

    /// Step statuses that carry a decisive ledger entry
    pub const DECIDED_STEP_STATUSES: &[StepStatus] = &[StepStatus::Approved, StepStatus::Rejected];
}

/// System-wide defaults
pub mod system {
    /// Address recorded when a decision arrives without one
    pub const UNKNOWN_SOURCE_ADDRESS: &str = "unknown";
}
