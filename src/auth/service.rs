//! Login, refresh and logout.
//!
//! Produces tokens only. Turning them into cookies happens at the HTTP
//! boundary.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::db::{AccountState, Database, User, UserRole, normalize_email};
use crate::jwt::{IssuedToken, TokenCodec, TokenError, TokenKind, TokenPair};

use super::cookie::{Cookie, TokenTransport};
use super::credentials::{CredentialVerifier, MatchResult, verify_blocking};
use super::errors::AuthError;
use super::types::Principal;

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    codec: Arc<TokenCodec>,
    transport: TokenTransport,
    verifier: Arc<dyn CredentialVerifier>,
    /// Checked in place of a real user so unknown emails cost as much as known ones
    decoy: Arc<User>,
}

impl AuthService {
    pub fn new(
        db: Database,
        codec: Arc<TokenCodec>,
        transport: TokenTransport,
        verifier: Arc<dyn CredentialVerifier>,
        decoy_hash: String,
    ) -> Self {
        let decoy = User {
            id: 0,
            uuid: String::new(),
            email: String::new(),
            password_hash: decoy_hash,
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::User,
            account_state: AccountState::Unconfirmed,
        };
        Self {
            db,
            codec,
            transport,
            verifier,
            decoy: Arc::new(decoy),
        }
    }

    /// Check credentials and issue a token pair.
    ///
    /// The password is verified before the account state so that locked and
    /// unconfirmed accounts are only revealed to someone who knows the password.
    pub async fn login(&self, email: &str, password: &str, now: u64) -> Result<TokenPair, AuthError> {
        let email = normalize_email(email);

        let user = match self.db.users().get_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(email = %email, "Login attempt for unknown user");
                let decoy = User::clone(&self.decoy);
                let _ = verify_blocking(self.verifier.clone(), decoy, password.to_string()).await;
                return Err(AuthError::UnauthorizedCredentials);
            }
            Err(e) => {
                error!("Failed to get user: {}", e);
                return Err(AuthError::Internal);
            }
        };

        let user_id = user.id;
        let account_state = user.account_state;
        let verdict = verify_blocking(self.verifier.clone(), user, password.to_string())
            .await
            .map_err(|e| {
                error!("Credential verification failed: {}", e);
                AuthError::Internal
            })?;

        if verdict == MatchResult::Mismatch {
            warn!(user_id, "Login failed: invalid password");
            return Err(AuthError::UnauthorizedCredentials);
        }

        match account_state {
            AccountState::Banned => {
                warn!(user_id, "Login refused: account is locked");
                return Err(AuthError::ForbiddenLocked);
            }
            AccountState::Unconfirmed => {
                warn!(user_id, "Login refused: account not confirmed");
                return Err(AuthError::ForbiddenInactive);
            }
            AccountState::Confirmed => {}
        }

        let pair = self.codec.issue_pair(&email, now).map_err(|e| {
            error!("Failed to generate tokens: {}", e);
            AuthError::Internal
        })?;

        info!(user_id, "User logged in");
        Ok(pair)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token itself is not rotated and stays usable until it expires.
    pub fn refresh(&self, refresh_token: &str, now: u64) -> Result<IssuedToken, AuthError> {
        let subject = self
            .codec
            .subject_of(refresh_token, TokenKind::Refresh, now)
            .map_err(|e| match e {
                TokenError::Expired => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?;

        self.codec
            .issue(TokenKind::Access, &subject, now)
            .map_err(|e| {
                error!("Failed to generate access token: {}", e);
                AuthError::Internal
            })
    }

    /// Cookies that log the client out. Safe to call without a session.
    pub fn logout(&self, principal: Option<&Principal>) -> [Cookie; 2] {
        if let Some(principal) = principal {
            info!(user_id = principal.user_id, "User logged out");
        }
        self.transport.logout_cookies()
    }
}
