//! Project-scoped authorization.
//!
//! Handlers call [`ProjectPermissions::require_member`] or
//! [`ProjectPermissions::require_role`] before touching project data. The
//! store is consulted on every call.

use std::collections::BTreeSet;

use crate::db::{CollaboratorStore, Database, ProjectRole};

use super::errors::AuthError;

/// Roles allowed to change who collaborates on a project.
pub const COLLABORATOR_MANAGERS: &[ProjectRole] = &[ProjectRole::Owner, ProjectRole::Admin];

/// True iff `held` shares at least one role with `required`.
pub fn roles_intersect(held: &BTreeSet<ProjectRole>, required: &[ProjectRole]) -> bool {
    required.iter().any(|role| held.contains(role))
}

#[derive(Clone)]
pub struct ProjectPermissions {
    collaborators: CollaboratorStore,
}

impl ProjectPermissions {
    pub fn new(db: &Database) -> Self {
        Self {
            collaborators: db.collaborators(),
        }
    }

    /// True iff the user has a grant on the project, with or without roles.
    pub async fn is_member(&self, user_id: i64, project_id: i64) -> Result<bool, sqlx::Error> {
        Ok(self.collaborators.find(user_id, project_id).await?.is_some())
    }

    /// True iff the user has a grant on the project holding any of `required`.
    pub async fn has_role(
        &self,
        user_id: i64,
        project_id: i64,
        required: &[ProjectRole],
    ) -> Result<bool, sqlx::Error> {
        Ok(self
            .collaborators
            .find(user_id, project_id)
            .await?
            .is_some_and(|c| roles_intersect(&c.roles, required)))
    }

    /// Roles the user holds on the project, or `Forbidden` if not a member.
    pub async fn require_member(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<BTreeSet<ProjectRole>, AuthError> {
        match self.collaborators.find(user_id, project_id).await {
            Ok(Some(collaborator)) => Ok(collaborator.roles),
            Ok(None) => {
                tracing::debug!(user_id, project_id, "Not a project member");
                Err(AuthError::Forbidden)
            }
            Err(e) => {
                tracing::error!("Failed to check project membership: {}", e);
                Err(AuthError::Internal)
            }
        }
    }

    /// `Forbidden` unless the user holds one of `required` on the project.
    pub async fn require_role(
        &self,
        user_id: i64,
        project_id: i64,
        required: &[ProjectRole],
    ) -> Result<(), AuthError> {
        let held = self.require_member(user_id, project_id).await?;
        if roles_intersect(&held, required) {
            Ok(())
        } else {
            tracing::debug!(user_id, project_id, "Missing required project role");
            Err(AuthError::Forbidden)
        }
    }
}
