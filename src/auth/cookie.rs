//! Cookie transport for access and refresh tokens.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue, header};

use crate::jwt::TokenKind;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "Access-Token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "Refresh-Token";

/// Cookie name carrying tokens of the given kind.
pub fn cookie_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => ACCESS_COOKIE_NAME,
        TokenKind::Refresh => REFRESH_COOKIE_NAME,
    }
}

/// A cookie to be sent in a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: &'static str,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub path: &'static str,
    pub max_age_seconds: u64,
}

impl Cookie {
    /// Render as a header value. Token values are base64url so this only
    /// fails on a corrupt value, in which case the cookie is dropped.
    pub fn header_value(&self) -> Option<HeaderValue> {
        match HeaderValue::from_str(&self.to_string()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(cookie = self.name, "Invalid cookie value: {}", e);
                None
            }
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        write!(f, "; Path={}; Max-Age={}", self.path, self.max_age_seconds)
    }
}

/// Builds token cookies and reads them back from requests.
///
/// Cookies are always HttpOnly and Secure with path `/`.
#[derive(Debug, Clone, Copy)]
pub struct TokenTransport {
    access_max_age: u64,
    refresh_max_age: u64,
}

impl TokenTransport {
    pub fn new(access_ttl_minutes: u32, refresh_ttl_minutes: u32) -> Self {
        Self {
            access_max_age: u64::from(access_ttl_minutes) * 60,
            refresh_max_age: u64::from(refresh_ttl_minutes) * 60,
        }
    }

    fn cookie(kind: TokenKind, value: String, max_age_seconds: u64) -> Cookie {
        Cookie {
            name: cookie_name(kind),
            value,
            http_only: true,
            secure: true,
            path: "/",
            max_age_seconds,
        }
    }

    /// Cookie carrying `token`, living as long as tokens of `kind`.
    pub fn to_cookie(&self, kind: TokenKind, token: &str) -> Cookie {
        let max_age = match kind {
            TokenKind::Access => self.access_max_age,
            TokenKind::Refresh => self.refresh_max_age,
        };
        Self::cookie(kind, token.to_string(), max_age)
    }

    /// Cookie instructing the client to delete the `kind` cookie now.
    pub fn logout_cookie(&self, kind: TokenKind) -> Cookie {
        Self::cookie(kind, String::new(), 0)
    }

    /// Logout cookies for both token kinds.
    pub fn logout_cookies(&self) -> [Cookie; 2] {
        [
            self.logout_cookie(TokenKind::Access),
            self.logout_cookie(TokenKind::Refresh),
        ]
    }

    /// Token of `kind` from the request cookies. `Authorization` headers are ignored.
    pub fn extract(headers: &HeaderMap, kind: TokenKind) -> Option<&str> {
        get_cookie(headers, cookie_name(kind)).filter(|value| !value.is_empty())
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            if let Some((key, value)) = part.trim().split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}
