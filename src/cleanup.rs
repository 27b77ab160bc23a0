//! Scheduled cleanup of expired one-time tokens.

use crate::clock::unix_now;
use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    let now = unix_now();

    match db.confirmation_codes().delete_expired(now).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired confirmation codes", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up confirmation codes: {}", e),
    }

    match db.password_resets().delete_expired(now).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired password reset tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up password reset tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
