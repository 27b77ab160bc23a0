//! Password reset API endpoints.
//!
//! - POST `/forgot` - Email a reset link (same response whether or not the account exists)
//! - POST `/reset` - Set a new password with a reset token

use axum::{
    Json, Router, extract::State, middleware, response::IntoResponse, routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::accounts::{AccountError, AccountService};
use crate::clock::unix_now;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

const FORGOT_MESSAGE: &str =
    "If an account with this email exists, you will receive a password reset email.";
const RESET_MESSAGE: &str = "Password has been successfully reset.";
const INVALID_LINK_MESSAGE: &str = "The link is invalid or has expired. Please request a new one.";

#[derive(Clone)]
pub struct PasswordState {
    pub accounts: AccountService,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: PasswordState) -> Router {
    let forgot_router = Router::new()
        .route("/forgot", post(forgot))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    let reset_router = Router::new()
        .route("/reset", post(reset))
        .with_state(state);

    Router::new().merge(forgot_router).merge(reset_router)
}

#[derive(Deserialize)]
struct ForgotRequest {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetRequest {
    token: String,
    new_password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn forgot(
    State(state): State<PasswordState>,
    Json(payload): Json<ForgotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .request_password_reset(&payload.email, unix_now())
        .await
        .db_err("Failed to request password reset")?;

    Ok(Json(MessageResponse {
        message: FORGOT_MESSAGE,
    }))
}

async fn reset(
    State(state): State<PasswordState>,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .reset_password(&payload.token, payload.new_password, unix_now())
        .await
        .map_err(|e| match e {
            AccountError::InvalidInput(msg) => ApiError::bad_request(msg),
            AccountError::TokenNotFound | AccountError::TokenExpired => {
                ApiError::bad_request(INVALID_LINK_MESSAGE)
            }
            other => ApiError::db_error("Failed to reset password", other),
        })?;

    Ok(Json(MessageResponse {
        message: RESET_MESSAGE,
    }))
}
