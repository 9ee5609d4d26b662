//! Error types for the sign-off engine.
//!
//! Every failure the engine can surface is a [`SignoffError`] variant. Callers that
//! only need to branch on the broad category (HTTP status mapping, retry decisions)
//! use [`SignoffError::kind`].

use crate::config::ConfigurationError;
use crate::state_machine::errors::StateMachineError;
use crate::state_machine::states::{StepStatus, WorkflowStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignoffError {
    #[error("Workflow {workflow_id} not found")]
    WorkflowNotFound { workflow_id: Uuid },

    #[error("Step {step_order} not found in workflow {workflow_id}")]
    StepNotFound { workflow_id: Uuid, step_order: i32 },

    #[error("Workflow {workflow_id} is not active (status: {status})")]
    WorkflowNotActive {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },

    #[error("Step {step_order} of workflow {workflow_id} is not the active step (active: {active_step_order:?})")]
    StepNotActive {
        workflow_id: Uuid,
        step_order: i32,
        active_step_order: Option<i32>,
    },

    #[error("Step {step_order} of workflow {workflow_id} has already been decided (status: {status})")]
    StepAlreadyDecided {
        workflow_id: Uuid,
        step_order: i32,
        status: StepStatus,
    },

    #[error("Workflow {workflow_id} has already been started (status: {status})")]
    AlreadyStarted {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },

    #[error("Actor {actor_id} is not authorized to act on step {step_id}")]
    Forbidden { actor_id: Uuid, step_id: Uuid },

    #[error("Signature required: {0}")]
    SignatureRequired(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad failure categories used for caller-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    StateConflict,
    Forbidden,
    Validation,
    Storage,
    Configuration,
    Internal,
}

impl SignoffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WorkflowNotFound { .. } | Self::StepNotFound { .. } => ErrorKind::NotFound,
            Self::WorkflowNotActive { .. }
            | Self::StepNotActive { .. }
            | Self::StepAlreadyDecided { .. }
            | Self::AlreadyStarted { .. } => ErrorKind::StateConflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::SignatureRequired(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only transient storage failures may be retried, and only by the calling layer.
    /// A stale decision must never be resubmitted automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<sqlx::Error> for SignoffError {
    fn from(err: sqlx::Error) -> Self {
        SignoffError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SignoffError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SignoffError::Storage(format!("Migration failed: {err}"))
    }
}

impl From<serde_json::Error> for SignoffError {
    fn from(err: serde_json::Error) -> Self {
        SignoffError::Validation(format!("JSON serialization error: {err}"))
    }
}

impl From<StateMachineError> for SignoffError {
    fn from(err: StateMachineError) -> Self {
        SignoffError::Internal(err.to_string())
    }
}

impl From<ConfigurationError> for SignoffError {
    fn from(err: ConfigurationError) -> Self {
        SignoffError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SignoffError>;
