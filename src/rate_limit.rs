//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and mail flooding.

use axum::{
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
pub struct RateLimitConfig {
    /// Shared by login, registration and password reset requests
    pub auth: IpLimiter,
    /// Header carrying the client IP when behind a reverse proxy
    pub ip_header: Option<HeaderName>,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: NonZeroU32, ip_header: Option<HeaderName>) -> Self {
        Self {
            auth: RateLimiter::keyed(Quota::per_minute(requests_per_minute)),
            ip_header,
        }
    }
}

/// Middleware for rate limiting authentication endpoints.
pub async fn rate_limit_auth(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            tracing::warn!(reason, "Unable to determine client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.auth.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_per_ip() {
        let config = RateLimitConfig::new(NonZeroU32::new(2).unwrap(), None);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(config.auth.check_key(&a).is_ok());
        assert!(config.auth.check_key(&a).is_ok());
        assert!(config.auth.check_key(&a).is_err());
        assert!(config.auth.check_key(&b).is_ok());
    }
}
