//! Password hashing and verification.

use std::sync::Arc;

use crate::db::User;

/// Minimum password length in bytes.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in bytes (bcrypt ignores anything past 72).
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Outcome of comparing a presented password with a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    Mismatch,
}

/// Checks a presented password against a user's stored credential.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, user: &User, presented: &str) -> MatchResult;
}

/// bcrypt based password hashing.
#[derive(Debug, Clone, Copy)]
pub struct PasswordEncoder {
    cost: u32,
}

impl Default for PasswordEncoder {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordEncoder {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        bcrypt::hash(password, self.cost).map_err(CredentialError::Hashing)
    }
}

impl CredentialVerifier for PasswordEncoder {
    fn verify(&self, user: &User, presented: &str) -> MatchResult {
        match bcrypt::verify(presented, &user.password_hash) {
            Ok(true) => MatchResult::Match,
            Ok(false) => MatchResult::Mismatch,
            Err(e) => {
                tracing::error!(user_id = user.id, "Stored password hash is unusable: {}", e);
                MatchResult::Mismatch
            }
        }
    }
}

/// Run the verifier on the blocking thread pool.
pub async fn verify_blocking(
    verifier: Arc<dyn CredentialVerifier>,
    user: User,
    presented: String,
) -> Result<MatchResult, CredentialError> {
    tokio::task::spawn_blocking(move || verifier.verify(&user, &presented))
        .await
        .map_err(CredentialError::Join)
}

/// Hash a password on the blocking thread pool.
pub async fn hash_blocking(
    encoder: PasswordEncoder,
    password: String,
) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || encoder.hash(&password))
        .await
        .map_err(CredentialError::Join)?
}

/// Check length limits on a new password.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub enum CredentialError {
    Hashing(bcrypt::BcryptError),
    /// The blocking task panicked or was cancelled
    Join(tokio::task::JoinError),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Hashing(e) => write!(f, "Failed to hash password: {}", e),
            CredentialError::Join(e) => write!(f, "Password task failed: {}", e),
        }
    }
}

impl std::error::Error for CredentialError {}
