//! # Transition Engine
//!
//! Applies one decision to a workflow's active step.
//!
//! A submission runs in four phases:
//!
//! 1. **Load**: copy the workflow snapshot out of the store
//! 2. **Guard**: run every [`DecisionGuard`] in order; the first failure is returned
//! 3. **Plan**: compute the post-decision snapshot with [`WorkflowStateMachine`]
//! 4. **Commit**: hand the plan and its ledger entry to the store as one unit,
//!    conditioned on the snapshot still being current
//!
//! Validation happens against the snapshot, without holding any lock. A decision
//! that loses the race to another commit is reported as `StepAlreadyDecided` and
//! leaves storage untouched.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::authorization::Authorizer;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Result, SignoffError};
use crate::events::{transition_events, EventPublisher};
use crate::ledger::ApprovalLedger;
use crate::logging::{log_decision, log_decision_refused};
use crate::models::{Approval, Decision, DecisionOutcome, WorkflowSnapshot};
use crate::persistence::{CommitOutcome, TransitionCommit, WorkflowStore};
use crate::state_machine::{
    decision_guards, DecisionContext, DecisionGuard, StepStatus, TransitionPlan,
    WorkflowStateMachine,
};

pub struct TransitionEngine {
    store: Arc<dyn WorkflowStore>,
    authorizer: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    publisher: EventPublisher,
    config: EngineConfig,
    guards: Vec<Box<dyn DecisionGuard>>,
}

impl TransitionEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
        publisher: EventPublisher,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            authorizer,
            clock,
            publisher,
            config,
            guards: decision_guards(),
        }
    }

    /// Submit a decision on a workflow step.
    ///
    /// On success the ledger entry, the step change and the workflow change are all
    /// committed. On any error nothing is written.
    #[instrument(skip(self, decision), fields(
        workflow_id = %decision.workflow_id,
        step_order = decision.step_order,
        action = %decision.action,
    ))]
    pub async fn submit_decision(&self, decision: Decision) -> Result<DecisionOutcome> {
        match self.apply(&decision).await {
            Ok(outcome) => {
                log_decision(
                    decision.workflow_id,
                    decision.step_order,
                    decision.actor_id,
                    decision.action,
                    &outcome.workflow.status.to_string(),
                    &outcome.approval.source_address,
                );
                Ok(outcome)
            }
            Err(err) => {
                log_decision_refused(
                    decision.workflow_id,
                    decision.step_order,
                    decision.actor_id,
                    decision.action,
                    &decision.source_address,
                    &err,
                );
                Err(err)
            }
        }
    }

    async fn apply(&self, decision: &Decision) -> Result<DecisionOutcome> {
        let snapshot = self.load(decision.workflow_id).await?;
        let step = snapshot
            .step_by_order(decision.step_order)
            .ok_or(SignoffError::StepNotFound {
                workflow_id: decision.workflow_id,
                step_order: decision.step_order,
            })?;

        let ctx = DecisionContext {
            snapshot: &snapshot,
            step,
            decision,
            authorizer: self.authorizer.as_ref(),
            config: &self.config,
        };
        for guard in &self.guards {
            if let Err(err) = guard.check(&ctx).await {
                debug!(guard = guard.description(), error = %err, "Decision guard failed");
                return Err(err);
            }
        }

        let now = self.clock.now();
        let plan = WorkflowStateMachine::plan_decision(&snapshot, decision.action, now)?;
        Self::verify(&plan)?;

        let approval = ApprovalLedger::append(&snapshot, step, decision, now);
        let commit = TransitionCommit::from_plan(&plan, Some(approval.clone()));

        match self.store.commit(commit).await? {
            CommitOutcome::Committed => {}
            CommitOutcome::Conflict => {
                warn!(
                    workflow_id = %decision.workflow_id,
                    step_order = decision.step_order,
                    actor_id = %decision.actor_id,
                    "Decision lost optimistic check-and-set"
                );
                return Err(self.lost_race(decision).await);
            }
        }

        self.publish(&plan, &approval, now);

        let step = plan
            .target_step()
            .cloned()
            .ok_or_else(|| SignoffError::Internal("decided step missing from plan".into()))?;
        Ok(DecisionOutcome {
            workflow: plan.after.workflow,
            step,
            approval,
        })
    }

    async fn load(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot> {
        self.store
            .load_snapshot(workflow_id)
            .await?
            .ok_or(SignoffError::WorkflowNotFound { workflow_id })
    }

    fn verify(plan: &TransitionPlan) -> Result<()> {
        plan.after.check_invariants().map_err(|violation| {
            error!(
                workflow_id = %plan.after.workflow.workflow_id,
                violation = %violation,
                "Planned transition breaks workflow invariants"
            );
            SignoffError::Internal(violation)
        })
    }

    /// Error for a decision whose commit lost to a concurrent one
    async fn lost_race(&self, decision: &Decision) -> SignoffError {
        let status = match self.store.load_snapshot(decision.workflow_id).await {
            Ok(Some(current)) => current
                .step_by_order(decision.step_order)
                .map(|s| s.status)
                .unwrap_or(StepStatus::InProgress),
            _ => StepStatus::InProgress,
        };
        SignoffError::StepAlreadyDecided {
            workflow_id: decision.workflow_id,
            step_order: decision.step_order,
            status,
        }
    }

    fn publish(
        &self,
        plan: &TransitionPlan,
        approval: &Approval,
        now: DateTime<Utc>,
    ) {
        let workflow_id = plan.after.workflow.workflow_id;
        for (name, context) in transition_events(plan, Some(approval)) {
            let receivers = self.publisher.publish(name, workflow_id, context, now);
            debug!(event = name, receivers, "Lifecycle event published");
        }
    }
}
