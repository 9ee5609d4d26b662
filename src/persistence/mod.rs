//! # Persistence
//!
//! Storage seam for workflows, steps and ledger entries.
//!
//! A [`WorkflowStore`] hands out plain [`WorkflowSnapshot`] copies, each read from a
//! single committed state, and accepts
//! [`TransitionCommit`]s. A commit is all-or-nothing: the workflow row, every changed
//! step row and the optional ledger entry are written together, and only if the
//! workflow still carries the expected `lock_version` and the target step is still in
//! the expected status. Otherwise the store reports [`CommitOutcome::Conflict`] and
//! writes nothing.
//!
//! - [`InMemoryWorkflowStore`] - per-workflow mutex, used by tests and embedded callers
//! - [`PgWorkflowStore`] - PostgreSQL via sqlx, one transaction per commit

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Approval, Workflow, WorkflowSnapshot, WorkflowStep};
use crate::state_machine::{StepStatus, TransitionPlan};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryWorkflowStore;
#[cfg(feature = "postgres")]
pub use postgres::PgWorkflowStore;

/// One atomic unit of change against a single workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub workflow_id: Uuid,
    pub expected_lock_version: i64,
    pub target_step_id: Uuid,
    pub expected_step_status: StepStatus,
    /// Full post-transition workflow row
    pub workflow: Workflow,
    pub changed_steps: Vec<WorkflowStep>,
    pub approval: Option<Approval>,
}

impl TransitionCommit {
    pub fn from_plan(plan: &TransitionPlan, approval: Option<Approval>) -> Self {
        Self {
            workflow_id: plan.after.workflow.workflow_id,
            expected_lock_version: plan.expected_lock_version,
            target_step_id: plan.target_step_id,
            expected_step_status: plan.expected_step_status,
            workflow: plan.after.workflow.clone(),
            changed_steps: plan.changed_steps.clone(),
            approval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another transition won; nothing was written
    Conflict,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new workflow with its steps; fails with `Validation` on a duplicate id
    async fn insert_workflow(&self, workflow: &Workflow, steps: &[WorkflowStep]) -> Result<()>;

    async fn load_snapshot(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>>;

    /// Snapshot and ledger entries (`sequence` order) read from the same committed state
    async fn load_history(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<(WorkflowSnapshot, Vec<Approval>)>>;

    /// Snapshots of every `in_progress` workflow
    async fn list_active_workflows(&self) -> Result<Vec<WorkflowSnapshot>>;

    /// Ledger entries for one step in append order
    async fn approvals_for_step(&self, step_id: Uuid) -> Result<Vec<Approval>>;

    /// Ledger entries for one workflow in append (`sequence`) order
    async fn approvals_for_workflow(&self, workflow_id: Uuid) -> Result<Vec<Approval>>;

    async fn commit(&self, commit: TransitionCommit) -> Result<CommitOutcome>;
}
