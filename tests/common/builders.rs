//! Harness and builders for sign-off integration tests.

use chrono::{DateTime, TimeZone, Utc};
use signoff_core::authorization::{DepartmentRole, DirectoryAuthorizer};
use signoff_core::clock::ManualClock;
use signoff_core::config::SignoffConfig;
use signoff_core::models::{Decision, StepSpec, StepWithHistory, Workflow, WorkflowSnapshot};
use signoff_core::persistence::{InMemoryWorkflowStore, WorkflowStore};
use signoff_core::state_machine::{ActionKind, DecisionAction, StepStatus};
use signoff_core::SignoffSystem;
use std::sync::Arc;
use uuid::Uuid;

pub const SOURCE_ADDRESS: &str = "192.0.2.10";

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 30, 0).unwrap()
}

/// One department with a reviewer who may act on its department-wide steps
#[derive(Debug, Clone, Copy)]
pub struct Department {
    pub department_id: Uuid,
    pub reviewer_id: Uuid,
}

/// In-memory system wired to a directory authorizer and a manual clock
pub struct TestHarness {
    pub system: SignoffSystem,
    pub store: Arc<InMemoryWorkflowStore>,
    pub directory: Arc<DirectoryAuthorizer>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(SignoffConfig::default())
    }

    pub fn with_config(config: SignoffConfig) -> Self {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let directory = Arc::new(DirectoryAuthorizer::default());
        let clock = Arc::new(ManualClock::new(epoch()));
        let system = SignoffSystem::new(
            store.clone() as Arc<dyn WorkflowStore>,
            directory.clone(),
            clock.clone(),
            &config,
        );
        Self {
            system,
            store,
            directory,
            clock,
        }
    }

    pub fn department(&self) -> Department {
        let department = Department {
            department_id: Uuid::new_v4(),
            reviewer_id: Uuid::new_v4(),
        };
        self.directory.add_member(
            department.department_id,
            department.reviewer_id,
            DepartmentRole::Reviewer,
        );
        department
    }

    /// Create a workflow with one department-wide step per kind, returning its departments
    pub async fn create(&self, kinds: &[ActionKind]) -> (Workflow, Vec<Department>) {
        let departments: Vec<Department> = kinds.iter().map(|_| self.department()).collect();
        let specs = kinds
            .iter()
            .zip(&departments)
            .map(|(kind, dept)| StepSpec::new(dept.department_id, *kind))
            .collect();
        let workflow = self
            .system
            .create_workflow(Uuid::new_v4(), specs)
            .await
            .expect("create workflow");
        (workflow, departments)
    }

    /// Create and start a workflow of `steps` review steps
    pub async fn started(&self, steps: usize) -> (Workflow, Vec<Department>) {
        self.started_with(&vec![ActionKind::ReviewApprove; steps]).await
    }

    /// Create and start a workflow with one step per kind
    pub async fn started_with(&self, kinds: &[ActionKind]) -> (Workflow, Vec<Department>) {
        let (workflow, departments) = self.create(kinds).await;
        let workflow = self
            .system
            .start_workflow(workflow.workflow_id)
            .await
            .expect("start workflow");
        (workflow, departments)
    }

    pub async fn snapshot(&self, workflow_id: Uuid) -> WorkflowSnapshot {
        self.store
            .load_snapshot(workflow_id)
            .await
            .expect("load snapshot")
            .expect("workflow exists")
    }
}

/// Decision by `department`'s reviewer on `step_order`
pub fn decision(
    workflow: &Workflow,
    step_order: i32,
    department: &Department,
    action: DecisionAction,
) -> Decision {
    Decision::new(
        workflow.workflow_id,
        step_order,
        department.reviewer_id,
        action,
        SOURCE_ADDRESS,
    )
}

/// Step history for a run with approvals only: each approved step holds exactly one
/// ledger entry and every other step holds none.
pub fn assert_approve_only_history(history: &[StepWithHistory]) {
    for entry in history {
        let expected = usize::from(entry.step.status == StepStatus::Approved);
        assert_eq!(
            entry.approvals.len(),
            expected,
            "step {} is {} but has {} ledger entries",
            entry.step.step_order,
            entry.step.status,
            entry.approvals.len()
        );
    }
}
