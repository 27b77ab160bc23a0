//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failure outcomes of authentication and authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Route requires identity and none is attached to the request
    NotAuthenticated,
    /// Malformed, bad signature, or wrong token kind
    InvalidToken,
    ExpiredToken,
    UnauthorizedCredentials,
    /// Account exists but has not been confirmed
    ForbiddenInactive,
    /// Account has been banned
    ForbiddenLocked,
    /// Permission check failed
    Forbidden,
    Internal,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotAuthenticated
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::UnauthorizedCredentials => StatusCode::UNAUTHORIZED,
            AuthError::ForbiddenInactive | AuthError::ForbiddenLocked | AuthError::Forbidden => {
                StatusCode::FORBIDDEN
            }
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Token failures share one message.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "Not authenticated",
            AuthError::InvalidToken | AuthError::ExpiredToken => "Invalid or expired token",
            AuthError::UnauthorizedCredentials => "Invalid username or password.",
            AuthError::ForbiddenInactive => {
                "User account is not active. Please confirm your email."
            }
            AuthError::ForbiddenLocked => "User account is locked.",
            AuthError::Forbidden => "Access denied",
            AuthError::Internal => "Internal server error",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
