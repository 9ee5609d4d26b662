use serde::{Deserialize, Serialize};
use std::fmt;

/// Decisions a reviewer can record against the active step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approved,
    Rejected,
    /// Sends the workflow back to its first step for full re-review
    Returned,
    /// Approval carrying an opaque signature payload
    Signed,
}

impl DecisionAction {
    /// Get a string representation of the action for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Approved => "approve",
            Self::Rejected => "reject",
            Self::Returned => "return",
            Self::Signed => "sign",
        }
    }

    /// Approving actions move the workflow forward
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approved | Self::Signed)
    }

    pub fn requires_signature_payload(&self) -> bool {
        matches!(self, Self::Signed)
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Returned => write!(f, "returned"),
            Self::Signed => write!(f, "signed"),
        }
    }
}

impl std::str::FromStr for DecisionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "returned" => Ok(Self::Returned),
            "signed" => Ok(Self::Signed),
            _ => Err(format!("Invalid decision action: {s}")),
        }
    }
}

/// Events that drive an individual step's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepEvent {
    /// The step becomes the workflow's active step
    Activate,
    /// A reviewer decided on the active step
    Decide(DecisionAction),
    /// An earlier step was rejected, so this one is never entered
    Skip,
    /// The workflow was returned; this step's earlier outcome is superseded
    Reset,
}

impl StepEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Decide(action) => action.event_type(),
            Self::Skip => "skip",
            Self::Reset => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_actions() {
        assert!(DecisionAction::Approved.is_approval());
        assert!(DecisionAction::Signed.is_approval());
        assert!(!DecisionAction::Rejected.is_approval());
        assert!(!DecisionAction::Returned.is_approval());
    }

    #[test]
    fn test_action_round_trip_through_storage_strings() {
        for action in [
            DecisionAction::Approved,
            DecisionAction::Rejected,
            DecisionAction::Returned,
            DecisionAction::Signed,
        ] {
            assert_eq!(action.to_string().parse::<DecisionAction>().unwrap(), action);
        }
        assert!("acknowledged".parse::<DecisionAction>().is_err());
    }
}
