//! # Orchestration
//!
//! Components that turn caller requests into committed transitions:
//!
//! - [`TransitionEngine`] - validates and commits decisions
//! - [`WorkflowAggregate`] - workflow creation, start and read projections
//! - [`SignoffSystem`] - the operation surface composing both

pub mod signoff_system;
pub mod transition_engine;
pub mod workflow_aggregate;

pub use signoff_system::SignoffSystem;
pub use transition_engine::TransitionEngine;
pub use workflow_aggregate::{reference_code, WorkflowAggregate};
