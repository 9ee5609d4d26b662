//! # Structured Logging Module
//!
//! Environment-aware structured logging for the sign-off engine. Console output is
//! human-readable by default and JSON when configured, so decision audit lines can
//! be shipped as-is.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::error::SignoffError;
use crate::state_machine::events::DecisionAction;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging using environment defaults
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging with explicit overrides.
///
/// Only the first call per process has an effect.
pub fn init_structured_logging_with(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = std::env::var("RUST_LOG")
            .ok()
            .or_else(|| config.level.clone())
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = if config.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(EnvFilter::new(&filter))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&filter))
                .boxed()
        };

        // A global subscriber may already be installed by the host application
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            filter = %filter,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SIGNOFF_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a committed decision
pub fn log_decision(
    workflow_id: Uuid,
    step_order: i32,
    actor_id: Uuid,
    action: DecisionAction,
    outcome: &str,
    source_address: &str,
) {
    tracing::info!(
        workflow_id = %workflow_id,
        step_order = step_order,
        actor_id = %actor_id,
        action = %action,
        outcome = %outcome,
        source_address = %source_address,
        "DECISION_COMMITTED"
    );
}

/// Log a refused decision; authorization failures are audit-relevant
pub fn log_decision_refused(
    workflow_id: Uuid,
    step_order: i32,
    actor_id: Uuid,
    action: DecisionAction,
    source_address: &str,
    error: &SignoffError,
) {
    match error {
        SignoffError::Forbidden { .. } => tracing::warn!(
            workflow_id = %workflow_id,
            step_order = step_order,
            actor_id = %actor_id,
            action = %action,
            source_address = %source_address,
            error_kind = ?error.kind(),
            error = %error,
            "DECISION_FORBIDDEN"
        ),
        _ => tracing::debug!(
            workflow_id = %workflow_id,
            step_order = step_order,
            actor_id = %actor_id,
            action = %action,
            error_kind = ?error.kind(),
            error = %error,
            "DECISION_REFUSED"
        ),
    }
}

/// Log a workflow-level operation (create, start)
pub fn log_workflow_operation(
    operation: &str,
    workflow_id: Uuid,
    reference_code: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        workflow_id = %workflow_id,
        reference_code = %reference_code,
        status = %status,
        details = details,
        "WORKFLOW_OPERATION"
    );
}
