//! # Event System
//!
//! Lifecycle events derived from committed transitions. Events are computed from the
//! plan that was committed, so subscribers never see an event for state that was
//! rolled back.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};

use serde_json::{json, Value};

use crate::constants::events;
use crate::models::Approval;
use crate::state_machine::{DecisionAction, TransitionEffect, TransitionPlan};

/// Events for a committed plan, in the order subscribers should observe them
pub fn transition_events(
    plan: &TransitionPlan,
    approval: Option<&Approval>,
) -> Vec<(&'static str, Value)> {
    let workflow = &plan.after.workflow;
    let base = json!({
        "workflow_id": workflow.workflow_id,
        "reference_code": workflow.reference_code,
        "document_id": workflow.document_id,
        "status": workflow.status,
    });
    let with = |extra: Value| {
        let mut ctx = base.clone();
        if let (Some(target), Some(extra)) = (ctx.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        ctx
    };

    let mut out = Vec::new();

    if let Some(approval) = approval {
        let name = match approval.action {
            DecisionAction::Approved | DecisionAction::Signed => events::STEP_APPROVED,
            DecisionAction::Rejected => events::STEP_REJECTED,
            DecisionAction::Returned => events::STEP_RETURNED,
        };
        out.push((
            name,
            with(json!({
                "step_order": approval.step_order,
                "step_id": approval.step_id,
                "actor_id": approval.actor_id,
                "action": approval.action,
                "approval_id": approval.approval_id,
            })),
        ));
    }

    match &plan.effect {
        TransitionEffect::Started { first_step_order } => {
            out.push((events::WORKFLOW_STARTED, base.clone()));
            out.push((
                events::STEP_ACTIVATED,
                with(json!({ "step_order": first_step_order })),
            ));
        }
        TransitionEffect::Advanced { next_step_order } => {
            out.push((
                events::STEP_ACTIVATED,
                with(json!({ "step_order": next_step_order })),
            ));
        }
        TransitionEffect::Completed => {
            out.push((events::WORKFLOW_COMPLETED, base.clone()));
        }
        TransitionEffect::Rejected {
            skipped_step_orders,
        } => {
            for order in skipped_step_orders {
                out.push((events::STEP_SKIPPED, with(json!({ "step_order": order }))));
            }
            out.push((events::WORKFLOW_REJECTED, base.clone()));
        }
        TransitionEffect::Returned {
            returned_from_step_order,
        } => {
            out.push((
                events::WORKFLOW_RETURNED,
                with(json!({ "returned_from_step_order": returned_from_step_order })),
            ));
            out.push((events::STEP_ACTIVATED, with(json!({ "step_order": 1 }))));
        }
    }

    out
}
