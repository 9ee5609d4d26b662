//! # Authorization
//!
//! The engine never decides who may act on a step by itself; it asks an
//! [`Authorizer`]. [`DirectoryAuthorizer`] is an in-process implementation backed by
//! department memberships, suitable for embedding and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::WorkflowStep;

/// Authorization collaborator consulted for every decision and pending-work query
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `actor_id` may decide on `step`
    async fn authorize(&self, actor_id: Uuid, step: &WorkflowStep) -> Result<bool>;
}

/// Authorizer that admits everyone
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _actor_id: Uuid, _step: &WorkflowStep) -> Result<bool> {
        Ok(true)
    }
}

/// Role of a user within a department, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentRole {
    Member,
    Reviewer,
    Manager,
    Head,
}

/// Department-membership authorizer.
///
/// - the step's exact assignee is always eligible
/// - for department-wide steps, members of the owning department whose role is at
///   least `minimum_role` are eligible
/// - everyone else is refused
#[derive(Debug)]
pub struct DirectoryAuthorizer {
    memberships: DashMap<Uuid, HashMap<Uuid, DepartmentRole>>,
    minimum_role: DepartmentRole,
}

impl DirectoryAuthorizer {
    pub fn new(minimum_role: DepartmentRole) -> Self {
        Self {
            memberships: DashMap::new(),
            minimum_role,
        }
    }

    pub fn add_member(&self, department_id: Uuid, user_id: Uuid, role: DepartmentRole) {
        self.memberships
            .entry(department_id)
            .or_default()
            .insert(user_id, role);
    }

    pub fn remove_member(&self, department_id: Uuid, user_id: Uuid) {
        if let Some(mut members) = self.memberships.get_mut(&department_id) {
            members.remove(&user_id);
        }
    }

    pub fn role_of(&self, department_id: Uuid, user_id: Uuid) -> Option<DepartmentRole> {
        self.memberships
            .get(&department_id)
            .and_then(|members| members.get(&user_id).copied())
    }
}

impl Default for DirectoryAuthorizer {
    fn default() -> Self {
        Self::new(DepartmentRole::Reviewer)
    }
}

#[async_trait]
impl Authorizer for DirectoryAuthorizer {
    async fn authorize(&self, actor_id: Uuid, step: &WorkflowStep) -> Result<bool> {
        if step.is_assigned_to(actor_id) {
            return Ok(true);
        }
        if !step.is_department_wide() {
            return Ok(false);
        }
        Ok(self
            .role_of(step.department_id, actor_id)
            .is_some_and(|role| role >= self.minimum_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::states::{ActionKind, StepStatus};

    fn step(department_id: Uuid, assignee_id: Option<Uuid>) -> WorkflowStep {
        WorkflowStep {
            step_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            step_order: 1,
            department_id,
            assignee_id,
            action_kind: ActionKind::ReviewApprove,
            status: StepStatus::InProgress,
            due_date: None,
            started_at: None,
            completed_at: None,
            return_count: 0,
        }
    }

    #[tokio::test]
    async fn test_exact_assignee_is_eligible() {
        let auth = DirectoryAuthorizer::default();
        let assignee = Uuid::new_v4();
        let s = step(Uuid::new_v4(), Some(assignee));

        assert!(auth.authorize(assignee, &s).await.unwrap());
        assert!(!auth.authorize(Uuid::new_v4(), &s).await.unwrap());
    }

    #[tokio::test]
    async fn test_assigned_step_excludes_department_peers() {
        let auth = DirectoryAuthorizer::default();
        let department = Uuid::new_v4();
        let peer = Uuid::new_v4();
        auth.add_member(department, peer, DepartmentRole::Head);

        let s = step(department, Some(Uuid::new_v4()));
        assert!(!auth.authorize(peer, &s).await.unwrap());
    }

    #[tokio::test]
    async fn test_department_wide_step_checks_role() {
        let auth = DirectoryAuthorizer::new(DepartmentRole::Reviewer);
        let department = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        auth.add_member(department, reviewer, DepartmentRole::Reviewer);
        auth.add_member(department, member, DepartmentRole::Member);
        auth.add_member(Uuid::new_v4(), outsider, DepartmentRole::Head);

        let s = step(department, None);
        assert!(auth.authorize(reviewer, &s).await.unwrap());
        assert!(!auth.authorize(member, &s).await.unwrap());
        assert!(!auth.authorize(outsider, &s).await.unwrap());

        auth.remove_member(department, reviewer);
        assert!(!auth.authorize(reviewer, &s).await.unwrap());
    }
}
