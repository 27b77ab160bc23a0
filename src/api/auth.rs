//! Session API endpoints.
//!
//! - POST `/login` - Exchange email and password for a token pair
//! - POST `/refresh-token` - Exchange a refresh token for a new access token
//! - POST `/logout` - Clear both token cookies

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{AuthError, AuthService, OptionalAuth, TokenTransport};
use crate::clock::unix_now;
use crate::jwt::TokenKind;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

#[derive(Clone)]
pub struct AuthState {
    pub service: AuthService,
    pub transport: TokenTransport,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    let session_router = Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state);

    Router::new().merge(login_router).merge(session_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Log in and set both token cookies.
async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = state
        .service
        .login(&payload.email, &payload.password, unix_now())
        .await?;

    let access_cookie = state.transport.to_cookie(TokenKind::Access, &pair.access.token);
    let refresh_cookie = state.transport.to_cookie(TokenKind::Refresh, &pair.refresh.token);

    Ok((
        AppendHeaders([
            (SET_COOKIE, access_cookie.to_string()),
            (SET_COOKIE, refresh_cookie.to_string()),
        ]),
        Json(TokenResponse {
            access_token: Some(pair.access.token),
            refresh_token: Some(pair.refresh.token),
        }),
    ))
}

/// Issue a new access token.
/// The refresh token is read from the JSON body, falling back to the cookie.
async fn refresh_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|_| ApiError::bad_request("Invalid request body"))?
            .refresh_token
    };

    let refresh_token = from_body
        .filter(|token| !token.is_empty())
        .or_else(|| TokenTransport::extract(&headers, TokenKind::Refresh).map(str::to_string))
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let access = state
        .service
        .refresh(&refresh_token, unix_now())
        .map_err(|e| match e {
            AuthError::InvalidToken | AuthError::ExpiredToken => {
                tracing::warn!("Refresh rejected: {}", e);
                ApiError::unauthorized("Invalid refresh token")
            }
            other => other.into(),
        })?;

    let access_cookie = state.transport.to_cookie(TokenKind::Access, &access.token);

    Ok((
        AppendHeaders([(SET_COOKIE, access_cookie.to_string())]),
        Json(TokenResponse {
            access_token: Some(access.token),
            refresh_token: Some(refresh_token),
        }),
    ))
}

/// Clear both token cookies. Works with or without a session.
async fn logout(
    State(state): State<AuthState>,
    OptionalAuth(principal): OptionalAuth,
) -> impl IntoResponse {
    let [access_cookie, refresh_cookie] = state.service.logout(principal.as_ref());

    (
        AppendHeaders([
            (SET_COOKIE, access_cookie.to_string()),
            (SET_COOKIE, refresh_cookie.to_string()),
        ]),
        Json(TokenResponse {
            access_token: None,
            refresh_token: None,
        }),
    )
}
