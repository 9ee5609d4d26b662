use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::status_groups::{DECIDED_STEP_STATUSES, TERMINAL_WORKFLOW_STATUSES};

/// Overall status of an approval workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created, no step active yet
    #[default]
    Pending,
    /// Exactly one step is awaiting a decision
    InProgress,
    /// Every step approved
    Completed,
    /// A step was rejected; remaining steps skipped
    Rejected,
}

impl WorkflowStatus {
    /// Terminal statuses are permanent
    pub fn is_terminal(&self) -> bool {
        TERMINAL_WORKFLOW_STATUSES.contains(self)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

/// Lifecycle status of a single review step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Approved,
    Rejected,
    /// Never entered because an earlier step was rejected
    Skipped,
}

impl StepStatus {
    /// A decided step has consumed its decisive ledger entry
    pub fn is_decided(&self) -> bool {
        DECIDED_STEP_STATUSES.contains(self)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

/// What a step requires from its reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ReviewApprove,
    SignApprove,
    Acknowledge,
}

impl ActionKind {
    pub fn requires_signature(&self) -> bool {
        matches!(self, Self::SignApprove)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReviewApprove => write!(f, "review_approve"),
            Self::SignApprove => write!(f, "sign_approve"),
            Self::Acknowledge => write!(f, "acknowledge"),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "review_approve" => Ok(Self::ReviewApprove),
            "sign_approve" => Ok(Self::SignApprove),
            "acknowledge" => Ok(Self::Acknowledge),
            _ => Err(format!("Invalid action kind: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_status_terminal_check() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Rejected.is_terminal());
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_step_status_decided() {
        assert!(StepStatus::Approved.is_decided());
        assert!(StepStatus::Rejected.is_decided());
        assert!(!StepStatus::Skipped.is_decided());
        assert!(!StepStatus::InProgress.is_decided());
        assert!(!StepStatus::NotStarted.is_decided());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(WorkflowStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "completed".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::Completed
        );
        assert_eq!(StepStatus::NotStarted.to_string(), "not_started");
        assert_eq!("skipped".parse::<StepStatus>().unwrap(), StepStatus::Skipped);
        assert_eq!(
            "sign_approve".parse::<ActionKind>().unwrap(),
            ActionKind::SignApprove
        );
        assert!("complete".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&StepStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: ActionKind = serde_json::from_str("\"review_approve\"").unwrap();
        assert_eq!(parsed, ActionKind::ReviewApprove);
    }
}
