//! # Approval Ledger
//!
//! Append-only record of every decisive entry. Entries are built here and written
//! only inside a committed transition; nothing in the crate updates or removes one.
//!
//! [`replay`] feeds a workflow's entries back through the same transition rules the
//! engine uses, which reconstructs the committed workflow from its audit trail alone.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::system::UNKNOWN_SOURCE_ADDRESS;
use crate::error::{Result, SignoffError};
use crate::models::{Approval, Decision, WorkflowSnapshot, WorkflowStep};
use crate::persistence::WorkflowStore;
use crate::state_machine::{StepStatus, WorkflowStateMachine, WorkflowStatus};

#[derive(Clone)]
pub struct ApprovalLedger {
    store: Arc<dyn WorkflowStore>,
}

impl ApprovalLedger {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Build the decisive entry `decision` produces on `step`.
    ///
    /// The entry takes the next per-workflow `sequence` after `snapshot`, so it only
    /// commits against the exact snapshot it was built from.
    pub fn append(
        snapshot: &WorkflowSnapshot,
        step: &WorkflowStep,
        decision: &Decision,
        occurred_at: DateTime<Utc>,
    ) -> Approval {
        let source_address = match decision.source_address.trim() {
            "" => UNKNOWN_SOURCE_ADDRESS.to_string(),
            addr => addr.to_string(),
        };

        Approval {
            approval_id: Uuid::new_v4(),
            workflow_id: snapshot.workflow.workflow_id,
            step_id: step.step_id,
            step_order: step.step_order,
            sequence: snapshot.workflow.decision_count + 1,
            actor_id: decision.actor_id,
            action: decision.action,
            comment: decision.trimmed_comment().map(str::to_string),
            signature_payload: decision
                .signature_payload
                .clone()
                .filter(|_| decision.action.requires_signature_payload()),
            source_address,
            occurred_at,
        }
    }

    /// Entries for one step, oldest first
    pub async fn list_for_step(&self, step_id: Uuid) -> Result<Vec<Approval>> {
        let mut entries = self.store.approvals_for_step(step_id).await?;
        entries.sort_by_key(|a| a.sequence);
        Ok(entries)
    }

    /// The canonical audit trail: step order first, then chronological within a step
    pub async fn list_for_workflow(&self, workflow_id: Uuid) -> Result<Vec<Approval>> {
        let mut entries = self.store.approvals_for_workflow(workflow_id).await?;
        entries.sort_by_key(|a| (a.step_order, a.sequence));
        Ok(entries)
    }

    /// Snapshot plus its chronological entries, read from one committed state
    pub async fn history(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<(WorkflowSnapshot, Vec<Approval>)>> {
        let history = self.store.load_history(workflow_id).await?;
        Ok(history.map(|(snapshot, mut entries)| {
            entries.sort_by_key(|a| a.sequence);
            (snapshot, entries)
        }))
    }
}

/// Rebuild a workflow from its definition and ledger.
///
/// `definition` supplies identity, step layout and the start time; its mutable state
/// is discarded. Entries may be passed in any order and are applied by `sequence`.
pub fn replay(definition: &WorkflowSnapshot, entries: &[Approval]) -> Result<WorkflowSnapshot> {
    let mut snapshot = pristine(definition);

    let Some(started_at) = definition.workflow.started_at else {
        if entries.is_empty() {
            return Ok(snapshot);
        }
        return Err(SignoffError::validation(format!(
            "workflow {} has ledger entries but was never started",
            definition.workflow.workflow_id
        )));
    };
    snapshot = WorkflowStateMachine::plan_start(&snapshot, started_at)?.after;

    let mut ordered: Vec<&Approval> = entries.iter().collect();
    ordered.sort_by_key(|a| a.sequence);

    for entry in ordered {
        let active = snapshot.workflow.active_step_order();
        if active != Some(entry.step_order) {
            return Err(SignoffError::validation(format!(
                "ledger entry {} targets step {} but step {:?} is active",
                entry.sequence, entry.step_order, active
            )));
        }
        snapshot = WorkflowStateMachine::plan_decision(&snapshot, entry.action, entry.occurred_at)?
            .after;
    }

    Ok(snapshot)
}

fn pristine(definition: &WorkflowSnapshot) -> WorkflowSnapshot {
    let mut snapshot = definition.clone();
    let workflow = &mut snapshot.workflow;
    workflow.status = WorkflowStatus::Pending;
    workflow.current_step_index = 0;
    workflow.started_at = None;
    workflow.completed_at = None;
    workflow.return_count = 0;
    workflow.decision_count = 0;
    workflow.lock_version = 0;

    for step in &mut snapshot.steps {
        step.status = StepStatus::NotStarted;
        step.started_at = None;
        step.completed_at = None;
        step.return_count = 0;
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Workflow;
    use crate::state_machine::{ActionKind, DecisionAction};

    fn pending(step_count: usize) -> WorkflowSnapshot {
        let workflow_id = Uuid::new_v4();
        let steps: Vec<WorkflowStep> = (0..step_count)
            .map(|i| WorkflowStep {
                step_id: Uuid::new_v4(),
                workflow_id,
                step_order: i as i32 + 1,
                department_id: Uuid::new_v4(),
                assignee_id: None,
                action_kind: ActionKind::SignApprove,
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
                reference_code: "WF-LEDGER".into(),
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

    #[test]
    fn test_append_normalizes_entry() {
        let mut snap = pending(1);
        snap.workflow.decision_count = 4;
        let step = snap.steps[0].clone();
        let decision = Decision::new(
            snap.workflow.workflow_id,
            1,
            Uuid::new_v4(),
            DecisionAction::Approved,
            "   ",
        )
        .with_comment("  looks fine  ")
        .with_signature(vec![1, 2, 3]);

        let entry = ApprovalLedger::append(&snap, &step, &decision, Utc::now());

        assert_eq!(entry.sequence, 5);
        assert_eq!(entry.source_address, UNKNOWN_SOURCE_ADDRESS);
        assert_eq!(entry.comment.as_deref(), Some("looks fine"));
        assert!(entry.signature_payload.is_none());
        assert_eq!(entry.step_id, step.step_id);
    }

    #[test]
    fn test_replay_reconstructs_committed_state() {
        let start = Utc::now();
        let mut snap = WorkflowStateMachine::plan_start(&pending(3), start)
            .unwrap()
            .after;
        let mut entries = Vec::new();

        for action in [
            DecisionAction::Signed,
            DecisionAction::Returned,
            DecisionAction::Signed,
            DecisionAction::Signed,
            DecisionAction::Rejected,
        ] {
            let step = snap.current_step().unwrap().clone();
            let decision =
                Decision::new(snap.workflow.workflow_id, step.step_order, Uuid::new_v4(), action, "10.0.0.1");
            let now = Utc::now();
            entries.push(ApprovalLedger::append(&snap, &step, &decision, now));
            snap = WorkflowStateMachine::plan_decision(&snap, action, now)
                .unwrap()
                .after;
        }

        entries.reverse();
        let rebuilt = replay(&snap, &entries).unwrap();
        assert_eq!(rebuilt, snap);
        assert_eq!(rebuilt.workflow.status, WorkflowStatus::Rejected);
    }

    #[test]
    fn test_replay_of_unstarted_workflow_is_identity() {
        let snap = pending(2);
        assert_eq!(replay(&snap, &[]).unwrap(), snap);
    }
}
