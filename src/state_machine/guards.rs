use async_trait::async_trait;

use super::events::DecisionAction;
use super::states::StepStatus;
use crate::authorization::Authorizer;
use crate::config::EngineConfig;
use crate::error::{Result, SignoffError};
use crate::models::{Decision, WorkflowSnapshot, WorkflowStep};

/// Everything a guard may inspect when a decision is submitted
pub struct DecisionContext<'a> {
    pub snapshot: &'a WorkflowSnapshot,
    /// The step named by the decision's `step_order`
    pub step: &'a WorkflowStep,
    pub decision: &'a Decision,
    pub authorizer: &'a dyn Authorizer,
    pub config: &'a EngineConfig,
}

/// Trait for implementing decision preconditions
#[async_trait]
pub trait DecisionGuard: Send + Sync {
    /// Check the precondition, returning the distinct error for its violation
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard rejecting a second decision on a step that already took its decisive entry
pub struct StepNotDecidedGuard;

#[async_trait]
impl DecisionGuard for StepNotDecidedGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        if ctx.step.status.is_decided() {
            return Err(SignoffError::StepAlreadyDecided {
                workflow_id: ctx.snapshot.workflow.workflow_id,
                step_order: ctx.step.step_order,
                status: ctx.step.status,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Step must not already be decided"
    }
}

/// Guard to check the workflow is accepting decisions
pub struct WorkflowActiveGuard;

#[async_trait]
impl DecisionGuard for WorkflowActiveGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        let workflow = &ctx.snapshot.workflow;
        if !workflow.status.is_active() {
            return Err(SignoffError::WorkflowNotActive {
                workflow_id: workflow.workflow_id,
                status: workflow.status,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Workflow must be in progress"
    }
}

/// Guard to check the decision targets the workflow's active step
pub struct StepActiveGuard;

#[async_trait]
impl DecisionGuard for StepActiveGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        let active_step_order = ctx.snapshot.workflow.active_step_order();
        if active_step_order != Some(ctx.decision.step_order) {
            return Err(SignoffError::StepNotActive {
                workflow_id: ctx.snapshot.workflow.workflow_id,
                step_order: ctx.decision.step_order,
                active_step_order,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Decision must target the active step"
    }
}

/// Guard delegating actor eligibility to the authorization collaborator
pub struct ActorAuthorizedGuard;

#[async_trait]
impl DecisionGuard for ActorAuthorizedGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        let allowed = ctx
            .authorizer
            .authorize(ctx.decision.actor_id, ctx.step)
            .await?;
        if !allowed {
            return Err(SignoffError::Forbidden {
                actor_id: ctx.decision.actor_id,
                step_id: ctx.step.step_id,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be authorized for the step"
    }
}

/// Guard matching the action against the step's required kind and signature payload
pub struct SignatureGuard;

#[async_trait]
impl DecisionGuard for SignatureGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        let action = ctx.decision.action;
        let kind = ctx.step.action_kind;
        let payload = ctx.decision.signature_payload.as_deref();

        if action == DecisionAction::Signed {
            if !kind.requires_signature() {
                return Err(SignoffError::SignatureRequired(format!(
                    "step {} is {kind} and cannot be signed",
                    ctx.step.step_order
                )));
            }
            match payload {
                None | Some([]) => {
                    return Err(SignoffError::SignatureRequired(format!(
                        "signed decision on step {} carries no signature payload",
                        ctx.step.step_order
                    )))
                }
                Some(bytes) if bytes.len() > ctx.config.max_signature_bytes => {
                    return Err(SignoffError::validation(format!(
                        "signature payload too large: {} bytes (max: {})",
                        bytes.len(),
                        ctx.config.max_signature_bytes
                    )))
                }
                Some(_) => {}
            }
            return Ok(());
        }

        if action == DecisionAction::Approved && kind.requires_signature() {
            return Err(SignoffError::SignatureRequired(format!(
                "step {} requires a signed approval",
                ctx.step.step_order
            )));
        }
        if payload.is_some() {
            return Err(SignoffError::validation(format!(
                "signature payload is only accepted with a signed decision, got {action}"
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Signed decisions require a sign_approve step and a signature payload"
    }
}

/// Guard enforcing comment rules from configuration
pub struct CommentGuard;

#[async_trait]
impl DecisionGuard for CommentGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        let config = ctx.config;
        if let Some(comment) = ctx.decision.comment.as_deref() {
            let length = comment.chars().count();
            if length > config.max_comment_length {
                return Err(SignoffError::validation(format!(
                    "comment too long: {length} chars (max: {})",
                    config.max_comment_length
                )));
            }
        }

        let required = match ctx.decision.action {
            DecisionAction::Rejected => config.require_comment_on_rejection,
            DecisionAction::Returned => config.require_comment_on_return,
            DecisionAction::Approved | DecisionAction::Signed => false,
        };
        if required && ctx.decision.trimmed_comment().is_none() {
            return Err(SignoffError::validation(format!(
                "a comment is required when the decision is {}",
                ctx.decision.action
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Comments must satisfy length and presence rules"
    }
}

/// Re-entrancy guard: the step must still be awaiting its decision
pub struct StepInProgressGuard;

#[async_trait]
impl DecisionGuard for StepInProgressGuard {
    async fn check(&self, ctx: &DecisionContext<'_>) -> Result<()> {
        if ctx.step.status != StepStatus::InProgress {
            return Err(SignoffError::StepAlreadyDecided {
                workflow_id: ctx.snapshot.workflow.workflow_id,
                step_order: ctx.step.step_order,
                status: ctx.step.status,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Step must be in progress"
    }
}

/// Guards run for every decision, in evaluation order
pub fn decision_guards() -> Vec<Box<dyn DecisionGuard>> {
    vec![
        Box::new(StepNotDecidedGuard),
        Box::new(WorkflowActiveGuard),
        Box::new(StepActiveGuard),
        Box::new(ActorAuthorizedGuard),
        Box::new(SignatureGuard),
        Box::new(CommentGuard),
        Box::new(StepInProgressGuard),
    ]
}
