//! PostgreSQL store tests. Run with `--features postgres-tests` and `DATABASE_URL` set.

#![cfg(feature = "postgres-tests")]

mod common;

use common::*;
use futures::future::join_all;
use signoff_core::authorization::{DepartmentRole, DirectoryAuthorizer};
use signoff_core::clock::ManualClock;
use signoff_core::config::SignoffConfig;
use signoff_core::database::health_check;
use signoff_core::ledger::replay;
use signoff_core::models::{StepSpec, Workflow};
use signoff_core::persistence::{PgWorkflowStore, WorkflowStore};
use signoff_core::state_machine::{ActionKind, DecisionAction, StepStatus, WorkflowStatus};
use signoff_core::{SignoffError, SignoffSystem};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct PgHarness {
    system: Arc<SignoffSystem>,
    store: Arc<PgWorkflowStore>,
    directory: Arc<DirectoryAuthorizer>,
}

impl PgHarness {
    fn new(pool: PgPool) -> Self {
        let store = Arc::new(PgWorkflowStore::new(pool));
        let directory = Arc::new(DirectoryAuthorizer::default());
        let system = SignoffSystem::new(
            store.clone(),
            directory.clone(),
            Arc::new(ManualClock::new(epoch())),
            &SignoffConfig::default(),
        );
        Self {
            system: Arc::new(system),
            store,
            directory,
        }
    }

    async fn started(&self, steps: usize) -> (Workflow, Vec<Department>) {
        let departments: Vec<Department> = (0..steps)
            .map(|_| {
                let dept = Department {
                    department_id: Uuid::new_v4(),
                    reviewer_id: Uuid::new_v4(),
                };
                self.directory
                    .add_member(dept.department_id, dept.reviewer_id, DepartmentRole::Reviewer);
                dept
            })
            .collect();
        let specs = departments
            .iter()
            .map(|d| StepSpec::new(d.department_id, ActionKind::ReviewApprove))
            .collect();
        let workflow = self
            .system
            .create_workflow(Uuid::new_v4(), specs)
            .await
            .unwrap();
        let workflow = self.system.start_workflow(workflow.workflow_id).await.unwrap();
        (workflow, departments)
    }
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_workflow_round_trips_through_postgres(pool: PgPool) {
    let h = PgHarness::new(pool);
    let (workflow, _) = h.started(3).await;

    let snap = h
        .store
        .load_snapshot(workflow.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.workflow, workflow);
    assert_eq!(snap.steps.len(), 3);
    assert_eq!(snap.steps[0].status, StepStatus::InProgress);
    snap.check_invariants().unwrap();

    let active = h.store.list_active_workflows().await.unwrap();
    assert_eq!(active.len(), 1);
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_return_commits_and_replays(pool: PgPool) {
    let h = PgHarness::new(pool);
    let (workflow, depts) = h.started(3).await;

    for (order, dept) in [(1, &depts[0]), (2, &depts[1])] {
        h.system
            .submit_decision(decision(&workflow, order, dept, DecisionAction::Approved))
            .await
            .unwrap();
    }
    let outcome = h
        .system
        .submit_decision(
            decision(&workflow, 3, &depts[2], DecisionAction::Returned).with_comment("missing annex"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.workflow.current_step_index, 0);
    assert_eq!(outcome.workflow.return_count, 1);

    let snap = h
        .store
        .load_snapshot(workflow.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.steps[0].status, StepStatus::InProgress);
    assert_eq!(snap.steps[2].return_count, 1);
    snap.check_invariants().unwrap();

    let entries = h
        .system
        .ledger()
        .list_for_workflow(workflow.workflow_id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(replay(&snap, &entries).unwrap(), snap);
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_signature_payload_is_persisted(pool: PgPool) {
    let h = PgHarness::new(pool);
    let dept = Department {
        department_id: Uuid::new_v4(),
        reviewer_id: Uuid::new_v4(),
    };
    h.directory
        .add_member(dept.department_id, dept.reviewer_id, DepartmentRole::Manager);
    let workflow = h
        .system
        .create_workflow(
            Uuid::new_v4(),
            vec![StepSpec::new(dept.department_id, ActionKind::SignApprove)],
        )
        .await
        .unwrap();
    h.system.start_workflow(workflow.workflow_id).await.unwrap();

    let signature = vec![0xde, 0xad, 0xbe, 0xef];
    h.system
        .submit_decision(
            decision(&workflow, 1, &dept, DecisionAction::Signed).with_signature(signature.clone()),
        )
        .await
        .unwrap();

    let history = h
        .system
        .list_steps_with_history(workflow.workflow_id)
        .await
        .unwrap();
    assert_eq!(history[0].step.status, StepStatus::Approved);
    assert_eq!(history[0].approvals[0].signature_payload, Some(signature));
    assert_eq!(
        h.system.get_workflow(workflow.workflow_id).await.unwrap().status,
        WorkflowStatus::Completed
    );
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_concurrent_decisions_commit_once_in_postgres(pool: PgPool) {
    let h = PgHarness::new(pool);
    let (workflow, depts) = h.started(2).await;

    let handles = (0..6).map(|_| {
        let system = Arc::clone(&h.system);
        let d = decision(&workflow, 1, &depts[0], DecisionAction::Approved);
        tokio::spawn(async move { system.submit_decision(d).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SignoffError::StepAlreadyDecided { .. })));

    let entries = h
        .store
        .approvals_for_workflow(workflow.workflow_id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_duplicate_insert_is_validation_error(pool: PgPool) {
    let h = PgHarness::new(pool);
    let (workflow, _) = h.started(1).await;
    let snap = h
        .store
        .load_snapshot(workflow.workflow_id)
        .await
        .unwrap()
        .unwrap();

    let err = h
        .store
        .insert_workflow(&snap.workflow, &snap.steps)
        .await
        .unwrap_err();
    assert!(matches!(err, SignoffError::Validation(_)));
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_health_check_reports_live_pool(pool: PgPool) {
    assert!(health_check(&pool).await.unwrap());
}

#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]
async fn test_readers_never_observe_half_committed_decisions(pool: PgPool) {
    const STEPS: usize = 40;
    let h = PgHarness::new(pool);
    let (workflow, depts) = h.started(STEPS).await;
    let workflow_id = workflow.workflow_id;

    let writer = {
        let system = Arc::clone(&h.system);
        tokio::spawn(async move {
            for (idx, dept) in depts.iter().enumerate() {
                system
                    .submit_decision(decision(
                        &workflow,
                        idx as i32 + 1,
                        dept,
                        DecisionAction::Approved,
                    ))
                    .await
                    .expect("sequential approval commits");
            }
        })
    };

    let mut reads = 0;
    while !writer.is_finished() {
        let snap = h.store.load_snapshot(workflow_id).await.unwrap().unwrap();
        snap.check_invariants()
            .unwrap_or_else(|e| panic!("torn snapshot after {reads} reads: {e}"));

        for active in h.store.list_active_workflows().await.unwrap() {
            active.check_invariants().unwrap();
        }

        let history = h.system.list_steps_with_history(workflow_id).await.unwrap();
        assert_approve_only_history(&history);
        reads += 1;
    }
    writer.await.expect("writer panicked");

    let snap = h.store.load_snapshot(workflow_id).await.unwrap().unwrap();
    assert_eq!(snap.workflow.status, WorkflowStatus::Completed);
    snap.check_invariants().unwrap();
    assert_approve_only_history(&h.system.list_steps_with_history(workflow_id).await.unwrap());
}
