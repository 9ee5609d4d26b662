//! PostgreSQL-backed [`WorkflowStore`].
//!
//! Each commit runs in one transaction. The workflow row is updated first with a
//! `lock_version` predicate, which both detects a lost race and takes the row lock
//! that serializes concurrent commits on the same workflow.
//!
//! Reads that combine rows from more than one table run in a `REPEATABLE READ`
//! read-only transaction, so they observe a single committed state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CommitOutcome, TransitionCommit, WorkflowStore};
use crate::error::{Result, SignoffError};
use crate::models::{Approval, Workflow, WorkflowSnapshot, WorkflowStep};
use crate::state_machine::{ActionKind, DecisionAction, StepStatus, WorkflowStatus};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct WorkflowRow {
    workflow_id: Uuid,
    reference_code: String,
    document_id: Uuid,
    current_step_index: i32,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    return_count: i32,
    decision_count: i64,
    lock_version: i64,
}

#[derive(Debug, FromRow)]
struct StepRow {
    step_id: Uuid,
    workflow_id: Uuid,
    step_order: i32,
    department_id: Uuid,
    assignee_id: Option<Uuid>,
    action_kind: String,
    status: String,
    due_date: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    return_count: i32,
}

#[derive(Debug, FromRow)]
struct ApprovalRow {
    approval_id: Uuid,
    workflow_id: Uuid,
    step_id: Uuid,
    step_order: i32,
    sequence: i64,
    actor_id: Uuid,
    action: String,
    comment: Option<String>,
    signature_payload: Option<Vec<u8>>,
    source_address: String,
    occurred_at: DateTime<Utc>,
}

fn parse_column<T: FromStr<Err = String>>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|e| SignoffError::storage(format!("corrupt {column} column: {e}")))
}

impl StepRow {
    fn into_step(self) -> Result<WorkflowStep> {
        Ok(WorkflowStep {
            step_id: self.step_id,
            workflow_id: self.workflow_id,
            step_order: self.step_order,
            department_id: self.department_id,
            assignee_id: self.assignee_id,
            action_kind: parse_column::<ActionKind>("action_kind", &self.action_kind)?,
            status: parse_column::<StepStatus>("status", &self.status)?,
            due_date: self.due_date,
            started_at: self.started_at,
            completed_at: self.completed_at,
            return_count: self.return_count,
        })
    }
}

impl WorkflowRow {
    fn into_snapshot(self, steps: Vec<WorkflowStep>) -> Result<WorkflowSnapshot> {
        Ok(WorkflowSnapshot {
            workflow: Workflow {
                workflow_id: self.workflow_id,
                reference_code: self.reference_code,
                document_id: self.document_id,
                step_ids: steps.iter().map(|s| s.step_id).collect(),
                current_step_index: self.current_step_index,
                status: parse_column::<WorkflowStatus>("status", &self.status)?,
                created_at: self.created_at,
                started_at: self.started_at,
                completed_at: self.completed_at,
                return_count: self.return_count,
                decision_count: self.decision_count,
                lock_version: self.lock_version,
            },
            steps,
        })
    }
}

impl ApprovalRow {
    fn into_approval(self) -> Result<Approval> {
        Ok(Approval {
            approval_id: self.approval_id,
            workflow_id: self.workflow_id,
            step_id: self.step_id,
            step_order: self.step_order,
            sequence: self.sequence,
            actor_id: self.actor_id,
            action: parse_column::<DecisionAction>("action", &self.action)?,
            comment: self.comment,
            signature_payload: self.signature_payload,
            source_address: self.source_address,
            occurred_at: self.occurred_at,
        })
    }
}

const SELECT_WORKFLOW: &str = r#"
    SELECT workflow_id, reference_code, document_id, current_step_index, status,
           created_at, started_at, completed_at, return_count, decision_count, lock_version
    FROM signoff_workflows
"#;

const SELECT_STEPS: &str = r#"
    SELECT step_id, workflow_id, step_order, department_id, assignee_id, action_kind,
           status, due_date, started_at, completed_at, return_count
    FROM signoff_workflow_steps
"#;

const SELECT_APPROVALS: &str = r#"
    SELECT approval_id, workflow_id, step_id, step_order, sequence, actor_id, action,
           comment, signature_payload, source_address, occurred_at
    FROM signoff_approvals
"#;

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a read-only snapshot transaction.
    ///
    /// Every statement inside sees the database as of the first one, so a workflow
    /// row is never paired with step or ledger rows from a different commit.
    async fn begin_read(&self) -> Result<Transaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn read_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowSnapshot>> {
        let row: Option<WorkflowRow> =
            sqlx::query_as(&format!("{SELECT_WORKFLOW} WHERE workflow_id = $1"))
                .bind(workflow_id)
                .fetch_optional(&mut **tx)
                .await?;

        match row {
            Some(row) => {
                let steps = Self::read_steps(tx, workflow_id).await?;
                Ok(Some(row.into_snapshot(steps)?))
            }
            None => Ok(None),
        }
    }

    async fn read_steps(
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowStep>> {
        let rows: Vec<StepRow> =
            sqlx::query_as(&format!("{SELECT_STEPS} WHERE workflow_id = $1 ORDER BY step_order"))
                .bind(workflow_id)
                .fetch_all(&mut **tx)
                .await?;
        rows.into_iter().map(StepRow::into_step).collect()
    }

    async fn read_approvals(
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: Uuid,
    ) -> Result<Vec<Approval>> {
        let rows: Vec<ApprovalRow> = sqlx::query_as(&format!(
            "{SELECT_APPROVALS} WHERE workflow_id = $1 ORDER BY sequence"
        ))
        .bind(workflow_id)
        .fetch_all(&mut **tx)
        .await?;
        rows.into_iter().map(ApprovalRow::into_approval).collect()
    }

    async fn update_step(
        tx: &mut Transaction<'_, Postgres>,
        workflow_id: Uuid,
        step: &WorkflowStep,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE signoff_workflow_steps
            SET status = $3, started_at = $4, completed_at = $5, return_count = $6
            WHERE step_id = $1 AND workflow_id = $2
            "#,
        )
        .bind(step.step_id)
        .bind(workflow_id)
        .bind(step.status.to_string())
        .bind(step.started_at)
        .bind(step.completed_at)
        .bind(step.return_count)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(SignoffError::Internal(format!(
                "step {} does not belong to workflow {workflow_id}",
                step.step_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    #[instrument(skip(self, workflow, steps), fields(workflow_id = %workflow.workflow_id))]
    async fn insert_workflow(&self, workflow: &Workflow, steps: &[WorkflowStep]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO signoff_workflows
            (workflow_id, reference_code, document_id, current_step_index, status,
             created_at, started_at, completed_at, return_count, decision_count, lock_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(workflow.workflow_id)
        .bind(&workflow.reference_code)
        .bind(workflow.document_id)
        .bind(workflow.current_step_index)
        .bind(workflow.status.to_string())
        .bind(workflow.created_at)
        .bind(workflow.started_at)
        .bind(workflow.completed_at)
        .bind(workflow.return_count)
        .bind(workflow.decision_count)
        .bind(workflow.lock_version)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            let duplicate = err
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == UNIQUE_VIOLATION);
            if duplicate {
                return Err(SignoffError::validation(format!(
                    "workflow {} or reference code {} already exists",
                    workflow.workflow_id, workflow.reference_code
                )));
            }
            return Err(err.into());
        }

        for step in steps {
            sqlx::query(
                r#"
                INSERT INTO signoff_workflow_steps
                (step_id, workflow_id, step_order, department_id, assignee_id, action_kind,
                 status, due_date, started_at, completed_at, return_count)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(step.step_id)
            .bind(step.workflow_id)
            .bind(step.step_order)
            .bind(step.department_id)
            .bind(step.assignee_id)
            .bind(step.action_kind.to_string())
            .bind(step.status.to_string())
            .bind(step.due_date)
            .bind(step.started_at)
            .bind(step.completed_at)
            .bind(step.return_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_snapshot(&self, workflow_id: Uuid) -> Result<Option<WorkflowSnapshot>> {
        let mut tx = self.begin_read().await?;
        let snapshot = Self::read_snapshot(&mut tx, workflow_id).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    async fn load_history(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<(WorkflowSnapshot, Vec<Approval>)>> {
        let mut tx = self.begin_read().await?;
        let history = match Self::read_snapshot(&mut tx, workflow_id).await? {
            Some(snapshot) => {
                let approvals = Self::read_approvals(&mut tx, workflow_id).await?;
                Some((snapshot, approvals))
            }
            None => None,
        };
        tx.commit().await?;
        Ok(history)
    }

    async fn list_active_workflows(&self) -> Result<Vec<WorkflowSnapshot>> {
        let mut tx = self.begin_read().await?;
        let rows: Vec<WorkflowRow> = sqlx::query_as(&format!(
            "{SELECT_WORKFLOW} WHERE status = $1 ORDER BY created_at"
        ))
        .bind(WorkflowStatus::InProgress.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            let steps = Self::read_steps(&mut tx, row.workflow_id).await?;
            snapshots.push(row.into_snapshot(steps)?);
        }
        tx.commit().await?;
        Ok(snapshots)
    }

    async fn approvals_for_step(&self, step_id: Uuid) -> Result<Vec<Approval>> {
        let rows: Vec<ApprovalRow> =
            sqlx::query_as(&format!("{SELECT_APPROVALS} WHERE step_id = $1 ORDER BY sequence"))
                .bind(step_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(ApprovalRow::into_approval).collect()
    }

    async fn approvals_for_workflow(&self, workflow_id: Uuid) -> Result<Vec<Approval>> {
        let mut tx = self.begin_read().await?;
        let approvals = Self::read_approvals(&mut tx, workflow_id).await?;
        tx.commit().await?;
        Ok(approvals)
    }

    #[instrument(skip(self, commit), fields(workflow_id = %commit.workflow_id))]
    async fn commit(&self, commit: TransitionCommit) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        let workflow = &commit.workflow;

        let updated = sqlx::query(
            r#"
            UPDATE signoff_workflows
            SET current_step_index = $3, status = $4, started_at = $5, completed_at = $6,
                return_count = $7, decision_count = $8, lock_version = $9
            WHERE workflow_id = $1 AND lock_version = $2
            "#,
        )
        .bind(commit.workflow_id)
        .bind(commit.expected_lock_version)
        .bind(workflow.current_step_index)
        .bind(workflow.status.to_string())
        .bind(workflow.started_at)
        .bind(workflow.completed_at)
        .bind(workflow.return_count)
        .bind(workflow.decision_count)
        .bind(workflow.lock_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("Commit conflict on lock_version");
            return Ok(CommitOutcome::Conflict);
        }

        let target_status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM signoff_workflow_steps WHERE step_id = $1 AND workflow_id = $2",
        )
        .bind(commit.target_step_id)
        .bind(commit.workflow_id)
        .fetch_optional(&mut *tx)
        .await?;

        let expected_status = commit.expected_step_status.to_string();
        if target_status.as_deref() != Some(expected_status.as_str()) {
            tx.rollback().await?;
            debug!(
                target_step_id = %commit.target_step_id,
                "Commit conflict on target step status"
            );
            return Ok(CommitOutcome::Conflict);
        }

        // Deactivate before activating so the single-active index never sees two rows
        let (activating, others): (Vec<_>, Vec<_>) = commit
            .changed_steps
            .iter()
            .partition(|s| s.status == StepStatus::InProgress);
        for step in others.into_iter().chain(activating) {
            Self::update_step(&mut tx, commit.workflow_id, step).await?;
        }

        if let Some(approval) = &commit.approval {
            sqlx::query(
                r#"
                INSERT INTO signoff_approvals
                (approval_id, workflow_id, step_id, step_order, sequence, actor_id, action,
                 comment, signature_payload, source_address, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(approval.approval_id)
            .bind(approval.workflow_id)
            .bind(approval.step_id)
            .bind(approval.step_order)
            .bind(approval.sequence)
            .bind(approval.actor_id)
            .bind(approval.action.to_string())
            .bind(&approval.comment)
            .bind(&approval.signature_payload)
            .bind(&approval.source_address)
            .bind(approval.occurred_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    }
}
