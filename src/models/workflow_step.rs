use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::states::{ActionKind, StepStatus};

/// One department-owned checkpoint in a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: Uuid,
    pub workflow_id: Uuid,
    /// 1-based position in the linear sequence
    pub step_order: i32,
    pub department_id: Uuid,
    /// Specific reviewer; `None` means anyone eligible in the owning department
    pub assignee_id: Option<Uuid>,
    pub action_kind: ActionKind,
    pub status: StepStatus,
    /// Advisory only, consumed by reminder collaborators
    pub due_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Returned marker: how many times a decision on this step sent the workflow back
    pub return_count: i32,
}

impl WorkflowStep {
    pub fn is_assigned_to(&self, actor_id: Uuid) -> bool {
        self.assignee_id == Some(actor_id)
    }

    pub fn is_department_wide(&self) -> bool {
        self.assignee_id.is_none()
    }

    /// True when the step is awaiting a decision past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.due_date.is_some_and(|due| due < now)
    }
}

/// Caller-supplied description of a step at workflow creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Explicit position; list position is used when omitted
    #[serde(default)]
    pub step_order: Option<i32>,
    pub department_id: Uuid,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    pub action_kind: ActionKind,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl StepSpec {
    pub fn new(department_id: Uuid, action_kind: ActionKind) -> Self {
        Self {
            step_order: None,
            department_id,
            assignee_id: None,
            action_kind,
            due_date: None,
        }
    }

    pub fn with_order(mut self, step_order: i32) -> Self {
        self.step_order = Some(step_order);
        self
    }

    pub fn with_assignee(mut self, assignee_id: Uuid) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}
