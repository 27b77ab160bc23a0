//! Axum extractors for authentication.
//!
//! Both read the [`Principal`] the authentication middleware attached to the
//! request. Neither touches tokens or the database.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::db::AccountState;

use super::errors::AuthError;
use super::types::Principal;

/// Extractor for endpoints that require an authenticated, active account.
///
/// Rejects anonymous requests with 401, and principals whose account has
/// since been banned or is not yet confirmed with 403.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::NotAuthenticated)?;

        match principal.account_state {
            AccountState::Confirmed => Ok(Auth(principal)),
            AccountState::Banned => Err(AuthError::ForbiddenLocked),
            AccountState::Unconfirmed => Err(AuthError::ForbiddenInactive),
        }
    }
}

/// Optional authentication extractor - never fails.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct OptionalAuth(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<Principal>().cloned()))
    }
}
