use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::events::DecisionAction;

/// Approval is an immutable ledger entry recording one actor's decision on one step.
///
/// Entries are only ever inserted as part of a committed transition and are never
/// updated or removed. `sequence` is monotonic per workflow and gives the
/// chronological order across steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: Uuid,
    pub workflow_id: Uuid,
    pub step_id: Uuid,
    pub step_order: i32,
    pub sequence: i64,
    pub actor_id: Uuid,
    pub action: DecisionAction,
    pub comment: Option<String>,
    /// Opaque signature blob, present iff `action` is `signed`
    pub signature_payload: Option<Vec<u8>>,
    pub source_address: String,
    pub occurred_at: DateTime<Utc>,
}

/// A decision submitted against a workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub workflow_id: Uuid,
    pub step_order: i32,
    pub actor_id: Uuid,
    pub action: DecisionAction,
    pub comment: Option<String>,
    pub signature_payload: Option<Vec<u8>>,
    pub source_address: String,
}

impl Decision {
    pub fn new(
        workflow_id: Uuid,
        step_order: i32,
        actor_id: Uuid,
        action: DecisionAction,
        source_address: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            step_order,
            actor_id,
            action,
            comment: None,
            signature_payload: None,
            source_address: source_address.into(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_signature(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.signature_payload = Some(payload.into());
        self
    }

    /// Comment with surrounding whitespace removed; blank comments count as absent
    pub fn trimmed_comment(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
