//! Shared pieces of the single-use token stores.

/// A stored single-use token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeToken {
    pub value: String,
    pub user_id: i64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: i64,
}

/// Why a single-use token could not be consumed.
#[derive(Debug)]
pub enum OneTimeTokenError {
    /// No such token, or it was already consumed
    NotFound,
    /// The token existed but was past its expiry. It has been deleted.
    Expired,
    Database(sqlx::Error),
}

impl From<sqlx::Error> for OneTimeTokenError {
    fn from(e: sqlx::Error) -> Self {
        OneTimeTokenError::Database(e)
    }
}

impl std::fmt::Display for OneTimeTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OneTimeTokenError::NotFound => write!(f, "Token not found"),
            OneTimeTokenError::Expired => write!(f, "Token expired"),
            OneTimeTokenError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for OneTimeTokenError {}

/// Turn the row removed by a `DELETE ... RETURNING user_id, expires_at` into an outcome.
pub(super) fn consumed(row: Option<(i64, i64)>, now: u64) -> Result<i64, OneTimeTokenError> {
    match row {
        None => Err(OneTimeTokenError::NotFound),
        Some((_, expires_at)) if expires_at < now as i64 => Err(OneTimeTokenError::Expired),
        Some((user_id, _)) => Ok(user_id),
    }
}

/// Fresh random token value.
pub(super) fn new_value() -> String {
    uuid::Uuid::new_v4().to_string()
}
