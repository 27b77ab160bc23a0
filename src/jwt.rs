//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with separate HS256 keys so that a
//! leaked access key cannot be used to mint refresh tokens. Every operation
//! takes `now` explicitly; expiry is checked against it rather than the
//! system clock.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Minimum decoded length of a signing secret, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Token kind. Also written into the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token authorizing API calls.
    Access,
    /// Long-lived token usable only to mint new access tokens.
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (normalized email of the user)
    pub sub: String,
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Raw token configuration, as read from the command line or environment.
#[derive(Clone)]
pub struct TokenSettings {
    /// Base64 encoded access token secret.
    pub access_secret: String,
    /// Base64 encoded refresh token secret.
    pub refresh_secret: String,
    pub access_ttl_minutes: u32,
    pub refresh_ttl_minutes: u32,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_minutes", &self.refresh_ttl_minutes)
            .finish()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub kind: TokenKind,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// One access token and one refresh token for the same subject.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl SigningKey {
    fn new(secret: &[u8], ttl_minutes: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds: u64::from(ttl_minutes) * 60,
        }
    }
}

/// Issues and verifies access and refresh tokens.
///
/// Immutable after construction and safe to share across requests.
pub struct TokenCodec {
    access: SigningKey,
    refresh: SigningKey,
}

impl TokenCodec {
    /// Build a codec from settings, failing if either secret is unusable.
    pub fn new(settings: &TokenSettings) -> Result<Self, TokenConfigError> {
        let access_secret = decode_secret(TokenKind::Access, &settings.access_secret)?;
        let refresh_secret = decode_secret(TokenKind::Refresh, &settings.refresh_secret)?;

        if access_secret == refresh_secret {
            return Err(TokenConfigError::SharedSecret);
        }
        if settings.access_ttl_minutes == 0 {
            return Err(TokenConfigError::ZeroLifetime(TokenKind::Access));
        }
        if settings.refresh_ttl_minutes == 0 {
            return Err(TokenConfigError::ZeroLifetime(TokenKind::Refresh));
        }

        Ok(Self {
            access: SigningKey::new(&access_secret, settings.access_ttl_minutes),
            refresh: SigningKey::new(&refresh_secret, settings.refresh_ttl_minutes),
        })
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given kind, in seconds.
    pub fn ttl_seconds(&self, kind: TokenKind) -> u64 {
        self.key(kind).ttl_seconds
    }

    /// Sign a token of `kind` for `subject`, expiring at `now + ttl(kind)`.
    pub fn issue(&self, kind: TokenKind, subject: &str, now: u64) -> Result<IssuedToken, TokenError> {
        let key = self.key(kind);
        let exp = now + key.ttl_seconds;

        let claims = TokenClaims {
            sub: subject.to_string(),
            kind,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            kind,
            expires_at: exp,
        })
    }

    /// Issue an access and a refresh token for the same subject.
    pub fn issue_pair(&self, subject: &str, now: u64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(TokenKind::Access, subject, now)?,
            refresh: self.issue(TokenKind::Refresh, subject, now)?,
        })
    }

    /// Verify signature, kind and expiry, returning the claims.
    ///
    /// A token is valid while `now < exp`.
    pub fn verify(&self, token: &str, kind: TokenKind, now: u64) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key(kind).decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        if data.claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// True iff the token verifies as `kind` at `now`. Never panics.
    pub fn validate(&self, token: &str, kind: TokenKind, now: u64) -> bool {
        self.verify(token, kind, now).is_ok()
    }

    /// Subject of a token that verifies as `kind` at `now`.
    pub fn subject_of(&self, token: &str, kind: TokenKind, now: u64) -> Result<String, TokenError> {
        self.verify(token, kind, now).map(|claims| claims.sub)
    }
}

fn decode_secret(kind: TokenKind, secret: &str) -> Result<Vec<u8>, TokenConfigError> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(TokenConfigError::MissingSecret(kind));
    }

    let bytes = STANDARD
        .decode(secret)
        .map_err(|_| TokenConfigError::InvalidBase64(kind))?;

    if bytes.len() < MIN_SECRET_BYTES {
        return Err(TokenConfigError::SecretTooShort {
            kind,
            len: bytes.len(),
        });
    }

    Ok(bytes)
}

/// Errors that can occur while issuing or verifying tokens.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Malformed, bad signature, or wrong kind
    Invalid,
    /// Signature valid but past its expiry
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Invalid => write!(f, "Invalid token"),
            TokenError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors that make a token configuration unusable.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenConfigError {
    MissingSecret(TokenKind),
    InvalidBase64(TokenKind),
    SecretTooShort { kind: TokenKind, len: usize },
    /// Access and refresh secrets decode to the same bytes
    SharedSecret,
    ZeroLifetime(TokenKind),
}

impl std::fmt::Display for TokenConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenConfigError::MissingSecret(kind) => {
                write!(f, "{} token secret is not set", kind.as_str())
            }
            TokenConfigError::InvalidBase64(kind) => {
                write!(f, "{} token secret is not valid base64", kind.as_str())
            }
            TokenConfigError::SecretTooShort { kind, len } => write!(
                f,
                "{} token secret must decode to at least {} bytes (got {})",
                kind.as_str(),
                MIN_SECRET_BYTES,
                len
            ),
            TokenConfigError::SharedSecret => {
                write!(f, "access and refresh token secrets must differ")
            }
            TokenConfigError::ZeroLifetime(kind) => {
                write!(f, "{} token lifetime must be at least one minute", kind.as_str())
            }
        }
    }
}

impl std::error::Error for TokenConfigError {}
