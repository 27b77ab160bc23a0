mod auth;
mod error;
mod password;
mod projects;
mod users;

use axum::Router;
use std::sync::Arc;
use url::Url;

use crate::accounts::AccountService;
use crate::auth::{AuthService, ProjectPermissions, TokenTransport};
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;
pub use error::ApiError;
pub use password::PasswordState;
pub use projects::ProjectsState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    auth_service: AuthService,
    accounts: AccountService,
    permissions: ProjectPermissions,
    transport: TokenTransport,
    frontend_url: Url,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = AuthState {
        service: auth_service,
        transport,
        rate_limit_config: rate_limit_config.clone(),
    };

    let users_state = UsersState {
        accounts: accounts.clone(),
        transport,
        frontend_url,
        rate_limit_config: rate_limit_config.clone(),
    };

    let password_state = PasswordState {
        accounts,
        rate_limit_config,
    };

    let projects_state = ProjectsState { db, permissions };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/password", password::router(password_state))
        .nest("/projects", projects::router(projects_state))
}
