//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::TokenSettings;
use crate::mail::LogMailer;
use axum::http::HeaderName;
use clap::Parser;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

/// Environment variables holding signing secrets.
const SECRET_ENV_VARS: [&str; 2] = ["JWT_AT_SECRET", "JWT_RT_SECRET"];

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasktracker",
    about = "Project and task tracker backend"
)]
pub struct Args {
    /// Base64 secret for signing access tokens (at least 32 bytes decoded)
    #[arg(long, env = "JWT_AT_SECRET", hide_env_values = true)]
    pub jwt_at_secret: String,

    /// Base64 secret for signing refresh tokens (at least 32 bytes decoded)
    #[arg(long, env = "JWT_RT_SECRET", hide_env_values = true)]
    pub jwt_rt_secret: String,

    /// Access token lifetime in minutes
    #[arg(long, env = "JWT_AT_LIVE_IN_MIN", value_parser = clap::value_parser!(u32).range(1..))]
    pub jwt_at_live_in_min: u32,

    /// Refresh token lifetime in minutes
    #[arg(long, env = "JWT_RT_LIVE_IN_MIN", value_parser = clap::value_parser!(u32).range(1..))]
    pub jwt_rt_live_in_min: u32,

    /// Days an email confirmation code stays valid
    #[arg(long, env = "CONFIRMATION_EXPIRATION_DAYS", default_value = "5",
        value_parser = clap::value_parser!(u32).range(1..))]
    pub confirmation_expiration_days: u32,

    /// Frontend base URL used in email links and redirects
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "tasktracker.db")]
    pub database: String,

    /// Login, registration and password reset requests allowed per IP per minute
    #[arg(long, default_value = "10")]
    pub auth_requests_per_minute: NonZeroU32,

    /// Header carrying the client IP when running behind a reverse proxy (e.g. "X-Real-IP").
    /// For list headers such as "X-Forwarded-For" the last entry is used.
    #[arg(long, value_parser = parse_header_name)]
    pub ip_header: Option<HeaderName>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_header_name(s: &str) -> Result<HeaderName, String> {
    HeaderName::try_from(s).map_err(|e| format!("Invalid header name '{}': {}", s, e))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Remove the signing secrets from the process environment once they are parsed.
///
/// Must run before the async runtime starts any worker threads.
pub fn scrub_secret_env() {
    for name in SECRET_ENV_VARS {
        if std::env::var_os(name).is_some() {
            // SAFETY: Called from `main` before the async runtime is built, so
            // this is the only thread.
            unsafe { std::env::remove_var(name) };
        }
    }
}

/// Parse and validate the frontend URL.
/// Returns None and logs an error if validation fails.
pub fn validate_frontend_url(frontend_url: &str) -> Option<Url> {
    let url = match Url::parse(frontend_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %frontend_url, error = %e, "Invalid frontend URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %frontend_url, "Frontend URL must use http or https");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: Args, db: Database, frontend_url: Url) -> ServerConfig {
    ServerConfig {
        db,
        tokens: TokenSettings {
            access_secret: args.jwt_at_secret,
            refresh_secret: args.jwt_rt_secret,
            access_ttl_minutes: args.jwt_at_live_in_min,
            refresh_ttl_minutes: args.jwt_rt_live_in_min,
        },
        frontend_url,
        confirmation_expiration_days: args.confirmation_expiration_days,
        auth_requests_per_minute: args.auth_requests_per_minute,
        ip_header: args.ip_header,
        mailer: Arc::new(LogMailer),
        password_cost: bcrypt::DEFAULT_COST,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
