use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{CommitOutcome, TransitionCommit, WorkflowStore};
use crate::error::{Result, SignoffError};
use crate::models::{Approval, Workflow, WorkflowSnapshot, WorkflowStep};

#[derive(Debug)]
struct WorkflowRecord {
    snapshot: WorkflowSnapshot,
    approvals: Vec<Approval>,
}

/// Process-local store.
///
/// Each workflow sits behind its own mutex, so commits on one workflow serialize
/// while different workflows proceed independently.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: DashMap<Uuid, Arc<Mutex<WorkflowRecord>>>,
    step_index: DashMap<Uuid, Uuid>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    fn record(&self, workflow_id: Uuid) -> Option<Arc<Mutex<WorkflowRecord>>> {
        // Clone the Arc out so the shard lock is released before the record lock is taken
        self.workflows.get(&workflow_id).map(|r| Arc::clone(r.value()))
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert_workflow(&self, workflow: &Workflow, steps: &[WorkflowStep]) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.workflows.entry(workflow.workflow_id) {
            Entry::Occupied(_) => Err(SignoffError::validation(format!(
                "workflow {} already exists",
                workflow.workflow_id
            ))),
            Entry::Vacant(slot) => {
                for step in steps {
                    self.step_index.insert(step.step_id, workflow.workflow_id);
                }
                let mut steps = steps.to_vec();
                steps.sort_by_key(|s| s.step_order);
                slot.insert(Arc::new(Mutex::new(WorkflowRecord {
                    snapshot: WorkflowSnapshot {
                        workflow: workflow.clone(),
                        steps,
                    },
                    approvals: Vec::new(),
                })));
                Ok(())
            }
        }
    }

    async fn load_snapshot(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>> {
        Ok(self
            .record(workflow_id)
            .map(|record| record.lock().snapshot.clone()))
    }

    async fn load_history(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<(WorkflowSnapshot, Vec<Approval>)>> {
        Ok(self.record(workflow_id).map(|record| {
            let record = record.lock();
            (record.snapshot.clone(), record.approvals.clone())
        }))
    }

    async fn list_active_workflows(&self) -> Result<Vec<WorkflowSnapshot>> {
        let records: Vec<_> = self.workflows.iter().map(|r| Arc::clone(r.value())).collect();
        Ok(records
            .iter()
            .map(|record| record.lock().snapshot.clone())
            .filter(|snapshot| snapshot.workflow.status.is_active())
            .collect())
    }

    async fn approvals_for_step(&self, step_id: Uuid) -> Result<Vec<Approval>> {
        let Some(workflow_id) = self.step_index.get(&step_id).map(|r| *r.value()) else {
            return Ok(Vec::new());
        };
        Ok(self
            .record(workflow_id)
            .map(|record| {
                record
                    .lock()
                    .approvals
                    .iter()
                    .filter(|a| a.step_id == step_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn approvals_for_workflow(&self, workflow_id: Uuid) -> Result<Vec<Approval>> {
        Ok(self
            .record(workflow_id)
            .map(|record| record.lock().approvals.clone())
            .unwrap_or_default())
    }

    async fn commit(&self, commit: TransitionCommit) -> Result<CommitOutcome> {
        let record = self
            .record(commit.workflow_id)
            .ok_or(SignoffError::WorkflowNotFound {
                workflow_id: commit.workflow_id,
            })?;
        let mut guard = record.lock();

        if guard.snapshot.workflow.lock_version != commit.expected_lock_version {
            debug!(
                workflow_id = %commit.workflow_id,
                expected = commit.expected_lock_version,
                actual = guard.snapshot.workflow.lock_version,
                "Commit conflict on lock_version"
            );
            return Ok(CommitOutcome::Conflict);
        }
        let target_status = guard
            .snapshot
            .steps
            .iter()
            .find(|s| s.step_id == commit.target_step_id)
            .map(|s| s.status);
        if target_status != Some(commit.expected_step_status) {
            return Ok(CommitOutcome::Conflict);
        }

        // Validate every changed row before mutating anything
        let mut positions = Vec::with_capacity(commit.changed_steps.len());
        for changed in &commit.changed_steps {
            let position = guard
                .snapshot
                .steps
                .iter()
                .position(|s| s.step_id == changed.step_id)
                .ok_or_else(|| {
                    SignoffError::Internal(format!(
                        "step {} does not belong to workflow {}",
                        changed.step_id, commit.workflow_id
                    ))
                })?;
            positions.push(position);
        }

        let record = &mut *guard;
        for (position, changed) in positions.into_iter().zip(commit.changed_steps) {
            record.snapshot.steps[position] = changed;
        }
        record.snapshot.workflow = commit.workflow;
        if let Some(approval) = commit.approval {
            record.approvals.push(approval);
        }

        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{ActionKind, StepStatus, WorkflowStateMachine, WorkflowStatus};
    use chrono::Utc;

    fn pending(step_count: usize) -> WorkflowSnapshot {
        let workflow_id = Uuid::new_v4();
        let steps: Vec<WorkflowStep> = (0..step_count)
            .map(|i| WorkflowStep {
                step_id: Uuid::new_v4(),
                workflow_id,
                step_order: i as i32 + 1,
                department_id: Uuid::new_v4(),
                assignee_id: None,
                action_kind: ActionKind::ReviewApprove,
                status: StepStatus::NotStarted,
                due_date: None,
                started_at: None,
                completed_at: None,
                return_count: 0,
            })
            .collect();
        WorkflowSnapshot {
            workflow: Workflow {
                workflow_id,
                reference_code: "WF-MEM".into(),
                document_id: Uuid::new_v4(),
                step_ids: steps.iter().map(|s| s.step_id).collect(),
                current_step_index: 0,
                status: WorkflowStatus::Pending,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                return_count: 0,
                decision_count: 0,
                lock_version: 0,
            },
            steps,
        }
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryWorkflowStore::new();
        let snap = pending(2);
        store.insert_workflow(&snap.workflow, &snap.steps).await.unwrap();

        let err = store
            .insert_workflow(&snap.workflow, &snap.steps)
            .await
            .unwrap_err();
        assert!(matches!(err, SignoffError::Validation(_)));
        assert_eq!(store.workflow_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_commit_conflicts_and_writes_nothing() {
        let store = InMemoryWorkflowStore::new();
        let snap = pending(2);
        store.insert_workflow(&snap.workflow, &snap.steps).await.unwrap();

        let plan = WorkflowStateMachine::plan_start(&snap, Utc::now()).unwrap();
        let first = store
            .commit(TransitionCommit::from_plan(&plan, None))
            .await
            .unwrap();
        let second = store
            .commit(TransitionCommit::from_plan(&plan, None))
            .await
            .unwrap();

        assert_eq!(first, CommitOutcome::Committed);
        assert_eq!(second, CommitOutcome::Conflict);

        let stored = store
            .load_snapshot(snap.workflow.workflow_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, plan.after);
        assert_eq!(store.list_active_workflows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_workflow_reads_empty() {
        let store = InMemoryWorkflowStore::new();
        assert!(store.load_snapshot(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.approvals_for_step(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(store
            .approvals_for_workflow(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}
