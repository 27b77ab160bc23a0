//! Tests for the forgot/reset password flow.

mod common;

use common::*;
use serde_json::json;
use tasktracker::db::AccountState;

const FORGOT_MESSAGE: &str =
    "If an account with this email exists, you will receive a password reset email.";
const INVALID_LINK_MESSAGE: &str = "The link is invalid or has expired. Please request a new one.";

async fn forgot(app: &TestApp, email: &str) -> serde_json::Value {
    let response = app
        .post_json("/api/v1/password/forgot", json!({ "email": email }), None)
        .await;
    assert_eq!(response.status(), 200);
    body_json(response).await
}

async fn reset(app: &TestApp, token: &str, new_password: &str) -> axum::http::Response<axum::body::Body> {
    app.post_json(
        "/api/v1/password/reset",
        json!({ "token": token, "newPassword": new_password }),
        None,
    )
    .await
}

#[tokio::test]
async fn test_forgot_does_not_reveal_accounts() {
    let app = setup().await;
    create_user(&app.db, "erin@example.com", AccountState::Confirmed).await;

    let known = forgot(&app, "erin@example.com").await;
    let unknown = forgot(&app, "nobody@example.com").await;

    assert_eq!(known, unknown);
    assert_eq!(known["message"], FORGOT_MESSAGE);
    assert_eq!(app.mailer.count(), 1);
    assert_eq!(app.mailer.last_recipient().unwrap(), "erin@example.com");
    assert_eq!(app.mailer.last_link().unwrap().path(), "/reset-password");
}

#[tokio::test]
async fn test_reset_password() {
    let app = setup().await;
    create_user(&app.db, "erin@example.com", AccountState::Confirmed).await;

    forgot(&app, "Erin@Example.com").await;
    let token = app.mailer.last_secret();

    let response = reset(&app, &token, "a-brand-new-password").await;
    assert_eq!(response.status(), 200);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Password has been successfully reset.");

    app.login("erin@example.com", "a-brand-new-password").await;

    let old = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "email": "erin@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(old.status(), 401);
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let app = setup().await;
    create_user(&app.db, "erin@example.com", AccountState::Confirmed).await;
    forgot(&app, "erin@example.com").await;
    let token = app.mailer.last_secret();

    assert_eq!(reset(&app, &token, "a-brand-new-password").await.status(), 200);

    let again = reset(&app, &token, "yet-another-password").await;
    assert_eq!(again.status(), 400);
    let json = body_json(again).await;
    assert_eq!(json["error"], INVALID_LINK_MESSAGE);

    app.login("erin@example.com", "a-brand-new-password").await;
}

#[tokio::test]
async fn test_new_request_replaces_previous_token() {
    let app = setup().await;
    create_user(&app.db, "erin@example.com", AccountState::Confirmed).await;

    forgot(&app, "erin@example.com").await;
    let first = app.mailer.last_secret();
    forgot(&app, "erin@example.com").await;
    let second = app.mailer.last_secret();
    assert_ne!(first, second);

    assert_eq!(reset(&app, &first, "a-brand-new-password").await.status(), 400);
    assert_eq!(reset(&app, &second, "a-brand-new-password").await.status(), 200);
}

#[tokio::test]
async fn test_unknown_token() {
    let app = setup().await;

    let response = reset(&app, "not-a-real-token", "a-brand-new-password").await;
    assert_eq!(response.status(), 400);
    let json = body_json(response).await;
    assert_eq!(json["error"], INVALID_LINK_MESSAGE);
}

#[tokio::test]
async fn test_weak_password_keeps_token_usable() {
    let app = setup().await;
    create_user(&app.db, "erin@example.com", AccountState::Confirmed).await;
    forgot(&app, "erin@example.com").await;
    let token = app.mailer.last_secret();

    assert_eq!(reset(&app, &token, "short").await.status(), 400);
    assert_eq!(reset(&app, &token, "long-enough-password").await.status(), 200);
}
