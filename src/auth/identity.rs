//! Principal lookup by username.

use crate::db::Database;

use super::types::Principal;

/// Resolve the principal for a username (email), ignoring case.
pub async fn resolve_principal(
    db: &Database,
    username: &str,
) -> Result<Option<Principal>, sqlx::Error> {
    let user = db.users().get_by_email(username).await?;
    Ok(user.as_ref().map(Principal::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AccountState, NewUser, UserRole};

    #[tokio::test]
    async fn test_resolve_principal() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create(&NewUser {
                uuid: "uuid-erin",
                email: "erin@example.com",
                password_hash: "hash",
                first_name: "Erin",
                last_name: "Example",
            })
            .await
            .unwrap();

        let principal = resolve_principal(&db, "Erin@Example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(principal.user_id, id);
        assert_eq!(principal.subject_id, "uuid-erin");
        assert_eq!(principal.username, "erin@example.com");
        assert_eq!(principal.role, UserRole::User);
        assert_eq!(principal.account_state, AccountState::Unconfirmed);

        assert!(
            resolve_principal(&db, "nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }
}
