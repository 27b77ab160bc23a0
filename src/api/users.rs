//! User account API endpoints.
//!
//! - POST `/register` - Create an unconfirmed account and email a confirmation link
//! - GET `/confirm/{code}` - Confirm the email, log in and redirect to the frontend
//! - GET `/me` - Current user
//! - PUT `/password` - Change the current user's password

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use super::error::ApiError;
use crate::accounts::{AccountError, AccountService, Registration};
use crate::auth::{Auth, TokenTransport};
use crate::clock::unix_now;
use crate::db::UserRole;
use crate::jwt::TokenKind;
use crate::mail::frontend_page;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

#[derive(Clone)]
pub struct UsersState {
    pub accounts: AccountService,
    pub transport: TokenTransport,
    pub frontend_url: Url,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: UsersState) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .route("/password", put(change_password))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    let account_router = Router::new()
        .route("/confirm/{code}", get(confirm))
        .route("/me", get(me))
        .with_state(state);

    Router::new().merge(register_router).merge(account_router)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    id: String,
    email: String,
    role: UserRole,
    confirmation_resent: bool,
}

async fn register(
    State(state): State<UsersState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registered = state
        .accounts
        .register(
            Registration {
                email: payload.email,
                password: payload.password,
                first_name: payload.first_name,
                last_name: payload.last_name,
            },
            unix_now(),
        )
        .await
        .map_err(|e| match e {
            AccountError::InvalidInput(msg) => ApiError::bad_request(msg),
            AccountError::AlreadyExists => ApiError::conflict("User already exists"),
            other => ApiError::db_error("Failed to register user", other),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: registered.subject_id,
            email: registered.email,
            role: registered.role,
            confirmation_resent: registered.confirmation_resent,
        }),
    ))
}

/// Confirm an email address. On success both token cookies are set and the
/// browser is sent to the frontend login page.
async fn confirm(
    State(state): State<UsersState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = state
        .accounts
        .confirm(&code, unix_now())
        .await
        .map_err(|e| match e {
            AccountError::TokenNotFound | AccountError::TokenExpired => {
                ApiError::not_found("Confirmation code is invalid or has expired")
            }
            AccountError::Locked => ApiError::forbidden("User account is locked."),
            other => ApiError::db_error("Failed to confirm user", other),
        })?;

    let access_cookie = state.transport.to_cookie(TokenKind::Access, &pair.access.token);
    let refresh_cookie = state.transport.to_cookie(TokenKind::Refresh, &pair.refresh.token);
    let login_page = frontend_page(&state.frontend_url, "login");

    Ok((
        AppendHeaders([
            (SET_COOKIE, access_cookie.to_string()),
            (SET_COOKIE, refresh_cookie.to_string()),
        ]),
        Redirect::to(login_page.as_str()),
    ))
}

async fn me(Auth(principal): Auth) -> impl IntoResponse {
    Json(principal)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
    confirm_new_password: String,
}

async fn change_password(
    State(state): State<UsersState>,
    Auth(principal): Auth,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .change_password(
            &principal,
            payload.current_password,
            payload.new_password,
            &payload.confirm_new_password,
        )
        .await
        .map_err(|e| match e {
            AccountError::InvalidInput(msg) => ApiError::bad_request(msg),
            AccountError::UnknownUser => ApiError::not_found("User not found"),
            other => ApiError::db_error("Failed to change password", other),
        })?;

    Ok(StatusCode::NO_CONTENT)
}
