//! Authentication user types.

use serde::Serialize;

use crate::db::{AccountState, User, UserRole};

/// The identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Database user ID
    #[serde(skip)]
    pub user_id: i64,
    /// Public user UUID
    pub subject_id: String,
    /// Normalized email, also the token subject
    pub username: String,
    pub role: UserRole,
    pub account_state: AccountState,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            subject_id: user.uuid.clone(),
            username: user.email.clone(),
            role: user.role,
            account_state: user.account_state,
        }
    }
}

/// Result of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No access token cookie was sent
    NoToken,
    Authenticated(Principal),
    Rejected(RejectReason),
}

/// Why a presented access token did not authenticate the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Malformed, bad signature, or wrong token kind
    Invalid,
    Expired,
    /// Token is valid but its subject no longer exists
    UnknownSubject,
    /// The user store could not be queried
    LookupFailed,
}
