//! Shared state for request authentication.

use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenCodec;

use super::cookie::TokenTransport;

/// Everything the request authenticator needs. Cheap to clone.
#[derive(Clone)]
pub struct AuthBackend {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub transport: TokenTransport,
}

impl AuthBackend {
    pub fn new(db: Database, codec: Arc<TokenCodec>, transport: TokenTransport) -> Self {
        Self {
            db,
            codec,
            transport,
        }
    }
}
