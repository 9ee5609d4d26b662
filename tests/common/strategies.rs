//! proptest strategies for decision sequences.

use proptest::prelude::*;
use signoff_core::state_machine::{ActionKind, DecisionAction};

/// One caller action against a running workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Decide on the active step. `Approved` on a `sign_approve` step is submitted
    /// as `Signed`.
    Decide(DecisionAction),
    /// Decide on a step that is not active (offset from the active step)
    WrongStep(i32),
    /// Resubmit the previous decision
    Resubmit,
}

pub fn decision_action_strategy() -> impl Strategy<Value = DecisionAction> {
    prop_oneof![
        6 => Just(DecisionAction::Approved),
        1 => Just(DecisionAction::Rejected),
        1 => Just(DecisionAction::Returned),
        2 => Just(DecisionAction::Signed),
    ]
}

pub fn action_kind_strategy() -> impl Strategy<Value = ActionKind> {
    prop_oneof![
        Just(ActionKind::ReviewApprove),
        Just(ActionKind::SignApprove),
        Just(ActionKind::Acknowledge),
    ]
}

/// Step layouts of one to six steps with mixed kinds
pub fn step_kinds_strategy() -> impl Strategy<Value = Vec<ActionKind>> {
    prop::collection::vec(action_kind_strategy(), 1..=6)
}

pub fn move_strategy() -> impl Strategy<Value = Move> {
    prop_oneof![
        8 => decision_action_strategy().prop_map(Move::Decide),
        1 => prop_oneof![Just(-1), Just(1), Just(2)].prop_map(Move::WrongStep),
        1 => Just(Move::Resubmit),
    ]
}

pub fn moves_strategy() -> impl Strategy<Value = Vec<Move>> {
    prop::collection::vec(move_strategy(), 0..24)
}
