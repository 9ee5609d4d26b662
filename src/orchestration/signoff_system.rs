//! # Sign-off System
//!
//! Operation surface of the engine. An outer HTTP or RPC layer calls these methods
//! and maps [`SignoffError::kind`](crate::error::SignoffError::kind) onto its own
//! status codes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{TransitionEngine, WorkflowAggregate};
use crate::authorization::Authorizer;
use crate::clock::{Clock, SystemClock};
use crate::config::SignoffConfig;
use crate::error::Result;
use crate::events::{EventPublisher, PublishedEvent};
use crate::ledger::ApprovalLedger;
use crate::models::{
    Decision, DecisionOutcome, StepSpec, StepWithHistory, Workflow, WorkflowStep,
};
use crate::persistence::{InMemoryWorkflowStore, WorkflowStore};
use crate::step_store::StepStore;

pub struct SignoffSystem {
    engine: TransitionEngine,
    workflows: WorkflowAggregate,
    step_store: StepStore,
    ledger: ApprovalLedger,
    authorizer: Arc<dyn Authorizer>,
    publisher: EventPublisher,
}

impl SignoffSystem {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
        config: &SignoffConfig,
    ) -> Self {
        let publisher = EventPublisher::new(config.events.channel_capacity);
        let engine = TransitionEngine::new(
            Arc::clone(&store),
            Arc::clone(&authorizer),
            Arc::clone(&clock),
            publisher.clone(),
            config.engine.clone(),
        );
        let workflows = WorkflowAggregate::new(
            Arc::clone(&store),
            clock,
            publisher.clone(),
            config.engine.clone(),
        );

        Self {
            engine,
            workflows,
            step_store: StepStore::new(Arc::clone(&store)),
            ledger: ApprovalLedger::new(store),
            authorizer,
            publisher,
        }
    }

    /// Process-local system backed by [`InMemoryWorkflowStore`] and the wall clock
    pub fn in_memory(authorizer: Arc<dyn Authorizer>, config: &SignoffConfig) -> Self {
        Self::new(
            Arc::new(InMemoryWorkflowStore::new()),
            authorizer,
            Arc::new(SystemClock),
            config,
        )
    }

    /// System backed by PostgreSQL. The pool must pass a health check; the schema is
    /// migrated first when configured to.
    #[cfg(feature = "postgres")]
    pub async fn connect(config: &SignoffConfig, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
        let pool = crate::database::connect(&config.database).await?;
        if !crate::database::health_check(&pool).await? {
            return Err(crate::error::SignoffError::storage("database health check failed"));
        }
        if config.database.run_migrations {
            crate::database::run_migrations(&pool).await?;
        }
        tracing::info!("Sign-off system connected to PostgreSQL");

        Ok(Self::new(
            Arc::new(crate::persistence::PgWorkflowStore::new(pool)),
            authorizer,
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Create a `pending` workflow with one `not_started` step per spec.
    ///
    /// Steps without an explicit `step_order` take their list position. Explicit
    /// orders must be distinct and at least 1; gaps such as `[10, 20, 30]` are
    /// renumbered to `1, 2, 3` in the same relative order.
    pub async fn create_workflow(
        &self,
        document_id: Uuid,
        ordered_steps: Vec<StepSpec>,
    ) -> Result<Workflow> {
        self.workflows.create(document_id, ordered_steps).await
    }

    pub async fn start_workflow(&self, workflow_id: Uuid) -> Result<Workflow> {
        self.workflows.start(workflow_id).await
    }

    pub async fn submit_decision(&self, decision: Decision) -> Result<DecisionOutcome> {
        self.engine.submit_decision(decision).await
    }

    pub async fn get_workflow(&self, workflow_id: Uuid) -> Result<Workflow> {
        self.workflows.get(workflow_id).await
    }

    pub async fn list_steps_with_history(&self, workflow_id: Uuid) -> Result<Vec<StepWithHistory>> {
        self.workflows.steps_with_history(workflow_id).await
    }

    pub async fn list_pending_for_actor(&self, actor_id: Uuid) -> Result<Vec<Workflow>> {
        self.workflows
            .pending_for_actor(actor_id, self.authorizer.as_ref())
            .await
    }

    /// Active steps past their due date, for reminder collaborators
    pub async fn list_overdue_steps(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowStep>> {
        self.workflows.overdue_steps(now).await
    }

    pub fn step_store(&self) -> &StepStore {
        &self.step_store
    }

    pub fn ledger(&self) -> &ApprovalLedger {
        &self.ledger
    }

    /// Lifecycle events published after each committed transition
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.publisher.subscribe()
    }
}
