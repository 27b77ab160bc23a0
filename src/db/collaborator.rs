use std::collections::BTreeSet;

use sqlx::sqlite::SqlitePool;

/// Role a user holds within a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Admin => "admin",
            ProjectRole::Member => "member",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(ProjectRole::Owner),
            "admin" => Some(ProjectRole::Admin),
            "member" => Some(ProjectRole::Member),
            _ => None,
        }
    }
}

/// A user's membership in a project together with the roles they hold there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub roles: BTreeSet<ProjectRole>,
}

#[derive(Clone)]
pub struct CollaboratorStore {
    pool: SqlitePool,
}

impl CollaboratorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a user to a project with the given roles. Returns the collaborator ID.
    pub async fn add(
        &self,
        user_id: i64,
        project_id: i64,
        roles: &[ProjectRole],
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("INSERT INTO project_collaborators (user_id, project_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
        let collaborator_id = result.last_insert_rowid();

        for role in roles {
            sqlx::query(
                "INSERT OR IGNORE INTO collaborator_roles (collaborator_id, role) VALUES (?, ?)",
            )
            .bind(collaborator_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(collaborator_id)
    }

    /// Get the membership of a user in a project, if any.
    pub async fn find(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<Option<Collaborator>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM project_collaborators WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id,)) = row else {
            return Ok(None);
        };

        let roles: Vec<(String,)> =
            sqlx::query_as("SELECT role FROM collaborator_roles WHERE collaborator_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(Collaborator {
            id,
            user_id,
            project_id,
            roles: roles
                .iter()
                .filter_map(|(role,)| ProjectRole::from_db(role))
                .collect(),
        }))
    }

    /// Replace the roles of an existing collaborator. Returns false if the user is not a member.
    pub async fn set_roles(
        &self,
        user_id: i64,
        project_id: i64,
        roles: &[ProjectRole],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM project_collaborators WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((collaborator_id,)) = row else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM collaborator_roles WHERE collaborator_id = ?")
            .bind(collaborator_id)
            .execute(&mut *tx)
            .await?;

        for role in roles {
            sqlx::query(
                "INSERT OR IGNORE INTO collaborator_roles (collaborator_id, role) VALUES (?, ?)",
            )
            .bind(collaborator_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Remove a user from a project.
    pub async fn remove(&self, user_id: i64, project_id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_collaborators WHERE user_id = ? AND project_id = ?")
                .bind(user_id)
                .bind(project_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
