//! # Data Models
//!
//! Plain data types shared by the stores, the transition engine and callers:
//!
//! - [`Workflow`] / [`WorkflowSnapshot`] - one approval run and its ordered steps
//! - [`WorkflowStep`] / [`StepSpec`] - a department-owned checkpoint and its creation input
//! - [`Approval`] / [`Decision`] - ledger entries and the decisions that produce them

pub mod approval;
pub mod workflow;
pub mod workflow_step;

pub use approval::{Approval, Decision};
pub use workflow::{Workflow, WorkflowSnapshot};
pub use workflow_step::{StepSpec, WorkflowStep};

use serde::{Deserialize, Serialize};

/// A step together with its ledger history, in append order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWithHistory {
    pub step: WorkflowStep,
    pub approvals: Vec<Approval>,
}

/// Result of a committed decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub workflow: Workflow,
    /// The decided step as committed
    pub step: WorkflowStep,
    pub approval: Approval,
}
