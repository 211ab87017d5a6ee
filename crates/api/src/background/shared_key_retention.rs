//! Periodic cleanup of long-expired shared keys.
//!
//! Expired keys stay visible to their sender for a while so the history of
//! a rent remains explainable; after the retention period they are deleted.

use std::time::Duration;

use chrono::Utc;
use smartbox_db::repositories::SharedKeyRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the shared-key retention loop until `cancel` is triggered.
///
/// Deletes keys whose deadline passed more than `retention_days` ago.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Shared key retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Shared key retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match SharedKeyRepo::purge_expired_before(&pool, cutoff).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Shared key retention: purged expired keys");
                        } else {
                            tracing::debug!("Shared key retention: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Shared key retention: cleanup failed");
                    }
                }
            }
        }
    }
}
