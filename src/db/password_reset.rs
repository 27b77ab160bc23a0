use sqlx::sqlite::SqlitePool;

use super::one_time::{OneTimeToken, OneTimeTokenError, consumed, new_value};

/// Password reset links are valid for one hour.
pub const PASSWORD_RESET_TTL_SECS: u64 = 60 * 60;

/// Store for password reset tokens.
///
/// Requesting a new token always replaces the old one, so only the most
/// recent reset link works.
#[derive(Clone)]
pub struct PasswordResetStore {
    pool: SqlitePool,
}

impl PasswordResetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete any token the user has and insert a fresh one.
    pub async fn create(&self, user_id: i64, now: u64) -> Result<String, sqlx::Error> {
        let token = new_value();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind((now + PASSWORD_RESET_TTL_SECS) as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(token)
    }

    /// Remove a token and return its user if it had not expired.
    ///
    /// The row is gone after this call regardless of the outcome.
    pub async fn consume_if_valid(&self, token: &str, now: u64) -> Result<i64, OneTimeTokenError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "DELETE FROM password_reset_tokens WHERE token = ? RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        consumed(row, now)
    }

    /// Get the outstanding token for a user, if any.
    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<OneTimeToken>, sqlx::Error> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT token, user_id, expires_at FROM password_reset_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value, user_id, expires_at)| OneTimeToken {
            value,
            user_id,
            expires_at,
        }))
    }

    /// Count outstanding tokens.
    #[cfg(test)]
    pub(crate) async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM password_reset_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Remove tokens that expired before `now`.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < ?")
            .bind(now as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
