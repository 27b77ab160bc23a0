//! Per-request authentication.
//!
//! Runs in front of every API route. A valid `Access-Token` cookie attaches
//! a [`Principal`] to the request extensions; anything else lets the request
//! through anonymously. Routes that need identity reject it themselves via
//! the [`Auth`](super::Auth) extractor.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::clock::unix_now;
use crate::jwt::{TokenError, TokenKind};

use super::cookie::{ACCESS_COOKIE_NAME, TokenTransport};
use super::identity::resolve_principal;
use super::state::AuthBackend;
use super::types::{AuthOutcome, RejectReason};

/// Decide who, if anyone, sent this request.
pub async fn authenticate_request(headers: &HeaderMap, backend: &AuthBackend, now: u64) -> AuthOutcome {
    let Some(token) = TokenTransport::extract(headers, TokenKind::Access) else {
        return AuthOutcome::NoToken;
    };

    let claims = match backend.codec.verify(token, TokenKind::Access, now) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            tracing::debug!("Access token expired");
            return AuthOutcome::Rejected(RejectReason::Expired);
        }
        Err(e) => {
            tracing::debug!("Rejected access token: {}", e);
            return AuthOutcome::Rejected(RejectReason::Invalid);
        }
    };

    match resolve_principal(&backend.db, &claims.sub).await {
        Ok(Some(principal)) => AuthOutcome::Authenticated(principal),
        Ok(None) => {
            tracing::warn!(subject = %claims.sub, "Access token for unknown user");
            AuthOutcome::Rejected(RejectReason::UnknownSubject)
        }
        Err(e) => {
            tracing::error!("Failed to get user: {}", e);
            AuthOutcome::Rejected(RejectReason::LookupFailed)
        }
    }
}

/// Middleware attaching the principal to the request.
///
/// An expired access token additionally gets its cookie cleared on the way
/// out. No other outcome touches cookies.
pub async fn authenticate(
    State(backend): State<AuthBackend>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = authenticate_request(request.headers(), &backend, unix_now()).await;

    let clear_access = match outcome {
        AuthOutcome::Authenticated(principal) => {
            request.extensions_mut().insert(principal);
            false
        }
        AuthOutcome::Rejected(RejectReason::Expired) => true,
        AuthOutcome::Rejected(_) | AuthOutcome::NoToken => false,
    };

    let mut response = next.run(request).await;

    if clear_access && !sets_cookie(&response, ACCESS_COOKIE_NAME) {
        if let Some(value) = backend
            .transport
            .logout_cookie(TokenKind::Access)
            .header_value()
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// True if the handler already wrote a `Set-Cookie` for `name`.
fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
}
