//! # Workflow Aggregate
//!
//! The user-facing side of a workflow. Writes are limited to creation and start;
//! everything else is a projection over the step store and the ledger.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::authorization::Authorizer;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::constants::events;
use crate::error::{Result, SignoffError};
use crate::events::{transition_events, EventPublisher};
use crate::ledger::ApprovalLedger;
use crate::logging::log_workflow_operation;
use crate::models::{
    StepSpec, StepWithHistory, Workflow, WorkflowSnapshot, WorkflowStep,
};
use crate::persistence::{CommitOutcome, TransitionCommit, WorkflowStore};
use crate::state_machine::{StepStatus, WorkflowStateMachine, WorkflowStatus};

pub struct WorkflowAggregate {
    store: Arc<dyn WorkflowStore>,
    ledger: ApprovalLedger,
    clock: Arc<dyn Clock>,
    publisher: EventPublisher,
    config: EngineConfig,
}

impl WorkflowAggregate {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        clock: Arc<dyn Clock>,
        publisher: EventPublisher,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger: ApprovalLedger::new(Arc::clone(&store)),
            store,
            clock,
            publisher,
            config,
        }
    }

    /// Create a `pending` workflow for `document_id` with its steps `not_started`
    #[instrument(skip(self, step_specs), fields(document_id = %document_id, steps = step_specs.len()))]
    pub async fn create(&self, document_id: Uuid, step_specs: Vec<StepSpec>) -> Result<Workflow> {
        let ordered = self.order_specs(step_specs)?;
        let now = self.clock.now();
        let workflow_id = Uuid::new_v4();

        let steps: Vec<WorkflowStep> = ordered
            .into_iter()
            .map(|(step_order, spec)| WorkflowStep {
                step_id: Uuid::new_v4(),
                workflow_id,
                step_order,
                department_id: spec.department_id,
                assignee_id: spec.assignee_id,
                action_kind: spec.action_kind,
                status: StepStatus::NotStarted,
                due_date: spec.due_date,
                started_at: None,
                completed_at: None,
                return_count: 0,
            })
            .collect();

        let workflow = Workflow {
            workflow_id,
            reference_code: reference_code(&self.config.reference_code_prefix, workflow_id, now),
            document_id,
            step_ids: steps.iter().map(|s| s.step_id).collect(),
            current_step_index: 0,
            status: WorkflowStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            return_count: 0,
            decision_count: 0,
            lock_version: 0,
        };

        self.store.insert_workflow(&workflow, &steps).await?;

        self.publisher.publish(
            events::WORKFLOW_CREATED,
            workflow_id,
            serde_json::json!({
                "workflow_id": workflow_id,
                "reference_code": workflow.reference_code,
                "document_id": document_id,
                "step_count": steps.len(),
            }),
            now,
        );
        log_workflow_operation(
            "create",
            workflow_id,
            &workflow.reference_code,
            &workflow.status.to_string(),
            None,
        );

        Ok(workflow)
    }

    /// Move a `pending` workflow to `in_progress` and activate its first step
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn start(&self, workflow_id: Uuid) -> Result<Workflow> {
        let snapshot = self.snapshot(workflow_id).await?;
        let now = self.clock.now();
        let plan = WorkflowStateMachine::plan_start(&snapshot, now)?;

        match self
            .store
            .commit(TransitionCommit::from_plan(&plan, None))
            .await?
        {
            CommitOutcome::Committed => {}
            CommitOutcome::Conflict => {
                let status = self
                    .store
                    .load_snapshot(workflow_id)
                    .await?
                    .map(|s| s.workflow.status)
                    .unwrap_or(WorkflowStatus::InProgress);
                return Err(SignoffError::AlreadyStarted {
                    workflow_id,
                    status,
                });
            }
        }

        for (name, context) in transition_events(&plan, None) {
            self.publisher.publish(name, workflow_id, context, now);
        }
        log_workflow_operation(
            "start",
            workflow_id,
            &plan.after.workflow.reference_code,
            &plan.after.workflow.status.to_string(),
            None,
        );

        Ok(plan.after.workflow)
    }

    pub async fn get(&self, workflow_id: Uuid) -> Result<Workflow> {
        Ok(self.snapshot(workflow_id).await?.workflow)
    }

    pub async fn snapshot(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.store
            .load_snapshot(workflow_id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound { workflow_id })
    }

    /// Every step in order with its ledger entries, oldest first
    pub async fn steps_with_history(&self, workflow_id: Uuid) -> Result<Vec<StepWithHistory>> {
        let (snapshot, entries) = self
            .ledger
            .history(workflow_id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound { workflow_id })?;
        let mut by_step: HashMap<Uuid, Vec<_>> = HashMap::new();
        for entry in entries {
            by_step.entry(entry.step_id).or_default().push(entry);
        }

        Ok(snapshot
            .steps
            .into_iter()
            .map(|step| StepWithHistory {
                approvals: by_step.remove(&step.step_id).unwrap_or_default(),
                step,
            })
            .collect())
    }

    /// Active workflows whose current step `actor_id` may decide on
    pub async fn pending_for_actor(
        &self,
        actor_id: Uuid,
        authorizer: &dyn Authorizer,
    ) -> Result<Vec<Workflow>> {
        let active = self.store.list_active_workflows().await?;

        let checks = active.into_iter().filter_map(|snapshot| {
            let step = snapshot.current_step()?.clone();
            Some(async move {
                let allowed = authorizer.authorize(actor_id, &step).await?;
                Ok::<_, SignoffError>(allowed.then_some(snapshot.workflow))
            })
        });

        Ok(try_join_all(checks).await?.into_iter().flatten().collect())
    }

    /// Active steps whose due date has passed
    pub async fn overdue_steps(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowStep>> {
        let active = self.store.list_active_workflows().await?;
        Ok(active
            .iter()
            .filter_map(|snapshot| snapshot.current_step())
            .filter(|step| step.is_overdue(now))
            .cloned()
            .collect())
    }

    /// Assign each spec its final `step_order` and sort by it.
    ///
    /// Specs without an explicit order take their list position. Orders must be
    /// positive and distinct; gaps are closed by renumbering to `1..=N` in the same
    /// relative order.
    fn order_specs(&self, specs: Vec<StepSpec>) -> Result<Vec<(i32, StepSpec)>> {
        if specs.is_empty() {
            return Err(SignoffError::validation("a workflow needs at least one step"));
        }
        if specs.len() > self.config.max_steps_per_workflow {
            return Err(SignoffError::validation(format!(
                "too many steps: {} (max: {})",
                specs.len(),
                self.config.max_steps_per_workflow
            )));
        }

        let mut ordered: Vec<(i32, StepSpec)> = specs
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| (spec.step_order.unwrap_or(idx as i32 + 1), spec))
            .collect();

        let mut seen = BTreeSet::new();
        for (order, _) in &ordered {
            if *order < 1 {
                return Err(SignoffError::validation(format!(
                    "step_order must be at least 1, got {order}"
                )));
            }
            if !seen.insert(*order) {
                return Err(SignoffError::validation(format!(
                    "duplicate step_order {order}"
                )));
            }
        }

        ordered.sort_by_key(|(order, _)| *order);
        for (idx, (order, _)) in ordered.iter_mut().enumerate() {
            *order = idx as i32 + 1;
        }
        Ok(ordered)
    }
}

/// Reference code `<prefix>-<YYYYMMDD>-<first 8 hex chars of the id>`
pub fn reference_code(prefix: &str, workflow_id: Uuid, created_at: DateTime<Utc>) -> String {
    let id = workflow_id.simple().to_string().to_uppercase();
    format!("{prefix}-{}-{}", created_at.format("%Y%m%d"), &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::persistence::InMemoryWorkflowStore;
    use crate::state_machine::ActionKind;
    use chrono::TimeZone;

    fn aggregate() -> WorkflowAggregate {
        let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        WorkflowAggregate::new(
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(ManualClock::new(start)),
            EventPublisher::new(16),
            EngineConfig::default(),
        )
    }

    fn spec() -> StepSpec {
        StepSpec::new(Uuid::new_v4(), ActionKind::ReviewApprove)
    }

    #[test]
    fn test_reference_code_format() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(reference_code("AUD", id, at), "AUD-20260102-A1B2C3D4");
    }

    #[tokio::test]
    async fn test_create_orders_by_explicit_step_order() {
        let agg = aggregate();
        let specs = vec![spec().with_order(2), spec().with_order(1)];
        let second_department = specs[0].department_id;

        let workflow = agg.create(Uuid::new_v4(), specs).await.unwrap();
        let snapshot = agg.snapshot(workflow.workflow_id).await.unwrap();

        assert_eq!(workflow.status, WorkflowStatus::Pending);
        assert_eq!(workflow.reference_code, reference_code("WF", workflow.workflow_id, workflow.created_at));
        assert_eq!(snapshot.steps[1].department_id, second_department);
        snapshot.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_bad_step_lists() {
        let agg = aggregate();

        let empty = agg.create(Uuid::new_v4(), vec![]).await.unwrap_err();
        assert!(matches!(empty, SignoffError::Validation(_)));

        let duplicate = agg
            .create(Uuid::new_v4(), vec![spec().with_order(1), spec().with_order(1)])
            .await
            .unwrap_err();
        assert!(matches!(duplicate, SignoffError::Validation(ref m) if m.contains("duplicate")));

        let zero = agg
            .create(Uuid::new_v4(), vec![spec().with_order(0), spec().with_order(1)])
            .await
            .unwrap_err();
        assert!(matches!(zero, SignoffError::Validation(ref m) if m.contains("at least 1")));
    }

    #[tokio::test]
    async fn test_create_closes_gaps_in_explicit_orders() {
        let agg = aggregate();
        let late = spec().with_order(30);
        let early = spec().with_order(3);
        let middle = spec().with_order(10);
        let departments = [early.department_id, middle.department_id, late.department_id];

        let workflow = agg
            .create(Uuid::new_v4(), vec![late, early, middle])
            .await
            .unwrap();
        let snap = agg.snapshot(workflow.workflow_id).await.unwrap();

        let orders: Vec<i32> = snap.steps.iter().map(|s| s.step_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        let assigned: Vec<Uuid> = snap.steps.iter().map(|s| s.department_id).collect();
        assert_eq!(assigned, departments);
        snap.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_is_already_started() {
        let agg = aggregate();
        let workflow = agg.create(Uuid::new_v4(), vec![spec(), spec()]).await.unwrap();

        let started = agg.start(workflow.workflow_id).await.unwrap();
        assert_eq!(started.status, WorkflowStatus::InProgress);
        assert_eq!(started.started_at, Some(started.created_at));

        let err = agg.start(workflow.workflow_id).await.unwrap_err();
        assert!(matches!(
            err,
            SignoffError::AlreadyStarted {
                status: WorkflowStatus::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let agg = aggregate();
        let err = agg.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SignoffError::WorkflowNotFound { .. }));
    }
}
