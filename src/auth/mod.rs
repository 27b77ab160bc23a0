//! Cookie-based JWT authentication and project authorization.
//!
//! Access tokens travel in the `Access-Token` cookie and are checked on every
//! request by [`authenticate`]. Refresh tokens travel in `Refresh-Token` and
//! are only accepted by the refresh endpoint.

mod cookie;
mod credentials;
mod errors;
mod extractors;
mod identity;
mod ip;
mod middleware;
mod permissions;
mod service;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, Cookie, REFRESH_COOKIE_NAME, TokenTransport, cookie_name, get_cookie,
};
pub use credentials::{
    CredentialError, CredentialVerifier, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, MatchResult,
    PasswordEncoder, hash_blocking, validate_password, verify_blocking,
};
pub use errors::AuthError;
pub use extractors::{Auth, OptionalAuth};
pub use identity::resolve_principal;
pub use ip::extract_client_ip;
pub use middleware::{authenticate, authenticate_request};
pub use permissions::{COLLABORATOR_MANAGERS, ProjectPermissions, roles_intersect};
pub use service::AuthService;
pub use state::AuthBackend;
pub use types::{AuthOutcome, Principal, RejectReason};
