#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Audit Sign-off Core
//!
//! Workflow approval engine for multi-party sign-off on audit reports.
//!
//! ## Overview
//!
//! A report moves through an ordered list of department-owned steps. Each step needs
//! an explicit decision (approve, sign, reject or return) before the next one
//! activates. The engine owns the state machine for that sequence, arbitrates
//! concurrent decisions on the same step, and records every decision in an
//! append-only ledger.
//!
//! ## Architecture
//!
//! Transitions are planned as pure functions over a [`models::WorkflowSnapshot`] and
//! committed through a [`persistence::WorkflowStore`] with an optimistic
//! check-and-set. A decision either commits its ledger entry, step change and
//! workflow change together, or fails with nothing written.
//!
//! ## Module Organization
//!
//! - [`models`] - Workflows, steps, ledger entries and decisions
//! - [`state_machine`] - Status enums, transition rules and decision guards
//! - [`step_store`] - Ordered step access and the advance rule
//! - [`ledger`] - Approval ledger and replay
//! - [`persistence`] - In-memory and PostgreSQL stores
//! - [`orchestration`] - Transition engine, workflow aggregate and the [`SignoffSystem`] facade
//! - [`authorization`] / [`clock`] - Collaborators the engine consumes
//! - [`events`] - Lifecycle events for notification and UI collaborators
//! - [`config`] / [`logging`] / [`error`] - Ambient configuration, tracing and errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signoff_core::authorization::AllowAll;
//! use signoff_core::config::SignoffConfig;
//! use signoff_core::models::{Decision, StepSpec};
//! use signoff_core::state_machine::{ActionKind, DecisionAction};
//! use signoff_core::SignoffSystem;
//! use uuid::Uuid;
//!
//! # async fn example() -> signoff_core::Result<()> {
//! let system = SignoffSystem::in_memory(Arc::new(AllowAll), &SignoffConfig::default());
//! let workflow = system
//!     .create_workflow(
//!         Uuid::new_v4(),
//!         vec![StepSpec::new(Uuid::new_v4(), ActionKind::ReviewApprove)],
//!     )
//!     .await?;
//! system.start_workflow(workflow.workflow_id).await?;
//!
//! let decision = Decision::new(
//!     workflow.workflow_id,
//!     1,
//!     Uuid::new_v4(),
//!     DecisionAction::Approved,
//!     "10.0.0.7",
//! );
//! let outcome = system.submit_decision(decision).await?;
//! println!("workflow is now {}", outcome.workflow.status);
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod clock;
pub mod config;
pub mod constants;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod state_machine;
pub mod step_store;

pub use config::{ConfigManager, SignoffConfig};
pub use error::{ErrorKind, Result, SignoffError};
pub use ledger::ApprovalLedger;
pub use models::{Approval, Decision, DecisionOutcome, StepSpec, Workflow, WorkflowStep};
pub use orchestration::SignoffSystem;
pub use state_machine::{ActionKind, DecisionAction, StepStatus, WorkflowStatus};
pub use step_store::StepStore;
