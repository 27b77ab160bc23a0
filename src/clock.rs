//! Wall clock access.
//!
//! Components take `now` as an argument; only request handlers and
//! background tasks read the clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
