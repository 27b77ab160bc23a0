use sqlx::sqlite::SqlitePool;

use super::one_time::{OneTimeToken, OneTimeTokenError, consumed, new_value};

/// Store for email confirmation codes.
///
/// Each user has at most one code. Asking again for a pending user extends
/// the existing code instead of replacing it, so links already sent keep
/// working.
#[derive(Clone)]
pub struct ConfirmationCodeStore {
    pool: SqlitePool,
}

impl ConfirmationCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a code for a user, replacing any code they already had.
    pub async fn generate(&self, user_id: i64, ttl_secs: u64, now: u64) -> Result<String, sqlx::Error> {
        let code = new_value();
        sqlx::query(
            "INSERT INTO confirmation_codes (code, user_id, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET code = excluded.code, expires_at = excluded.expires_at",
        )
        .bind(&code)
        .bind(user_id)
        .bind((now + ttl_secs) as i64)
        .execute(&self.pool)
        .await?;
        Ok(code)
    }

    /// Push back the expiry of the user's existing code, or create one if none exists.
    pub async fn regenerate_or_create(
        &self,
        user_id: i64,
        ttl_secs: u64,
        now: u64,
    ) -> Result<String, sqlx::Error> {
        let extended: Option<(String,)> = sqlx::query_as(
            "UPDATE confirmation_codes SET expires_at = ? WHERE user_id = ? RETURNING code",
        )
        .bind((now + ttl_secs) as i64)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match extended {
            Some((code,)) => Ok(code),
            None => self.generate(user_id, ttl_secs, now).await,
        }
    }

    /// Remove a code and return its user if it had not expired.
    ///
    /// The row is deleted whether or not it was still valid.
    pub async fn consume_if_valid(&self, code: &str, now: u64) -> Result<i64, OneTimeTokenError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "DELETE FROM confirmation_codes WHERE code = ? RETURNING user_id, expires_at",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        consumed(row, now)
    }

    /// Delete a code. Returns whether it existed.
    pub async fn invalidate(&self, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM confirmation_codes WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the pending code for a user, if any.
    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<OneTimeToken>, sqlx::Error> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT code, user_id, expires_at FROM confirmation_codes WHERE user_id = ?",
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

    /// Remove codes that expired before `now`.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM confirmation_codes WHERE expires_at < ?")
            .bind(now as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
