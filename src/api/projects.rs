//! Project membership API endpoints.
//!
//! - GET `/{project_id}/collaborators/me` - Roles of the current user on a project
//! - DELETE `/{project_id}/collaborators/{email}` - Remove a collaborator (owners and admins)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, COLLABORATOR_MANAGERS, ProjectPermissions};
use crate::db::{Database, ProjectRole, normalize_email};

#[derive(Clone)]
pub struct ProjectsState {
    pub db: Database,
    pub permissions: ProjectPermissions,
}

pub fn router(state: ProjectsState) -> Router {
    Router::new()
        .route("/{project_id}/collaborators/me", get(my_roles))
        .route(
            "/{project_id}/collaborators/{email}",
            delete(remove_collaborator),
        )
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipResponse {
    project_id: i64,
    roles: BTreeSet<ProjectRole>,
}

async fn my_roles(
    State(state): State<ProjectsState>,
    Auth(principal): Auth,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let roles = state
        .permissions
        .require_member(principal.user_id, project_id)
        .await?;

    Ok(Json(MembershipResponse { project_id, roles }))
}

async fn remove_collaborator(
    State(state): State<ProjectsState>,
    Auth(principal): Auth,
    Path((project_id, email)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .permissions
        .require_role(principal.user_id, project_id, COLLABORATOR_MANAGERS)
        .await?;

    let user = state
        .db
        .users()
        .get_by_email(&normalize_email(&email))
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("Collaborator not found"))?;

    let removed = state
        .db
        .collaborators()
        .remove(user.id, project_id)
        .await
        .db_err("Failed to remove collaborator")?;
    if !removed {
        return Err(ApiError::not_found("Collaborator not found"));
    }

    info!(
        user_id = user.id,
        project_id,
        removed_by = principal.user_id,
        "Collaborator removed"
    );
    Ok(StatusCode::NO_CONTENT)
}
