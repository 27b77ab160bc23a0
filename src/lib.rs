pub mod accounts;
pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod mail;
pub mod rate_limit;

use accounts::AccountService;
use api::create_api_router;
use auth::{
    AuthBackend, AuthService, CredentialError, PasswordEncoder, ProjectPermissions, TokenTransport,
    authenticate,
};
use axum::{Router, http::HeaderName, middleware};
use db::Database;
use jwt::{TokenCodec, TokenConfigError, TokenSettings};
use mail::Mailer;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

/// Path prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secrets and token lifetimes
    pub tokens: TokenSettings,
    /// Frontend base URL for email links and the post-confirmation redirect
    pub frontend_url: Url,
    /// Days an email confirmation code stays valid
    pub confirmation_expiration_days: u32,
    /// Login, registration and password reset requests allowed per IP per minute
    pub auth_requests_per_minute: NonZeroU32,
    /// Header carrying the client IP (requires running behind a proxy)
    pub ip_header: Option<HeaderName>,
    /// Delivers confirmation and password reset links
    pub mailer: Arc<dyn Mailer>,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

/// Why a [`ServerConfig`] could not be turned into an application.
#[derive(Debug)]
pub enum AppConfigError {
    Token(TokenConfigError),
    /// `password_cost` is outside the range bcrypt accepts
    PasswordCost(CredentialError),
}

impl std::fmt::Display for AppConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppConfigError::Token(e) => write!(f, "Invalid token configuration: {}", e),
            AppConfigError::PasswordCost(e) => write!(f, "Invalid password cost: {}", e),
        }
    }
}

impl std::error::Error for AppConfigError {}

impl From<TokenConfigError> for AppConfigError {
    fn from(e: TokenConfigError) -> Self {
        AppConfigError::Token(e)
    }
}

/// Create the application router with the given configuration.
///
/// Fails if the token settings or the password cost are unusable.
pub fn create_app(config: &ServerConfig) -> Result<Router, AppConfigError> {
    let codec = Arc::new(TokenCodec::new(&config.tokens)?);
    let transport = TokenTransport::new(
        config.tokens.access_ttl_minutes,
        config.tokens.refresh_ttl_minutes,
    );
    let encoder = PasswordEncoder::new(config.password_cost);
    let decoy_hash = encoder
        .hash(&uuid::Uuid::new_v4().to_string())
        .map_err(AppConfigError::PasswordCost)?;
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.auth_requests_per_minute,
        config.ip_header.clone(),
    ));

    let auth_service = AuthService::new(
        config.db.clone(),
        codec.clone(),
        transport,
        Arc::new(encoder),
        decoy_hash,
    );
    let accounts = AccountService::new(
        config.db.clone(),
        codec.clone(),
        encoder,
        config.mailer.clone(),
        config.frontend_url.clone(),
        config.confirmation_expiration_days,
    );
    let backend = AuthBackend::new(config.db.clone(), codec, transport);

    let api_router = create_api_router(
        config.db.clone(),
        auth_service,
        accounts,
        ProjectPermissions::new(&config.db),
        transport,
        config.frontend_url.clone(),
        rate_limit_config,
    )
    .layer(middleware::from_fn_with_state(backend, authenticate));

    Ok(Router::new().nest(API_PREFIX, api_router))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    // Run cleanup tasks on startup
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
