//! Retention sweeper: a periodic job that deletes rows from each bucket
//! older than that bucket's retention window. Idempotent and safe to run
//! concurrently with the writer, since a sweep and an insert never touch the
//! same row.

use crate::hub::store::{Store, StoreError};
use crate::wire::Bucket;
use chrono::{DateTime, Duration, Utc};

const ALL_BUCKETS: [Bucket; 5] =
    [Bucket::OneMin, Bucket::TenMin, Bucket::TwentyMin, Bucket::OneTwentyMin, Bucket::FourEightyMin];

/// One sweep cycle: for every bucket, delete `system_stats` and
/// `container_stats` rows older than its retention window. Returns the
/// total row count removed, for logging.
pub async fn sweep(store: &dyn Store, now: DateTime<Utc>) -> Result<u64, StoreError> {
    let mut removed = 0u64;
    for bucket in ALL_BUCKETS {
        let before = now - Duration::minutes(bucket.retention_minutes());
        removed += store.delete_system_stats_older_than(bucket, before).await?;
        removed += store.delete_container_stats_older_than(bucket, before).await?;
    }
    Ok(removed)
}

/// Runs [`sweep`] on a fixed interval until the process shuts down. Errors
/// from one cycle are logged and do not stop the loop — the next cycle
/// retries the same cutoffs.
pub async fn run(store: std::sync::Arc<dyn Store>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        match sweep(store.as_ref(), Utc::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, "retention sweep complete");
                }
            }
            Err(err) => tracing::error!(%err, "retention sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::store::sqlite::SqliteStore;
    use crate::wire::Stats;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn sweep_removes_only_rows_past_each_buckets_own_window() {
        let store = memory_store().await;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let now = Utc::now();

        let stale_1m = now - Duration::hours(2);
        let fresh_1m = now - Duration::minutes(10);
        let stale_20m = now - Duration::hours(25);
        let fresh_20m = now - Duration::hours(1);

        store.insert_system_stats(&system.id, Bucket::OneMin, stale_1m, &Stats::default()).await.unwrap();
        store.insert_system_stats(&system.id, Bucket::OneMin, fresh_1m, &Stats::default()).await.unwrap();
        store.insert_system_stats(&system.id, Bucket::TwentyMin, stale_20m, &Stats::default()).await.unwrap();
        store.insert_system_stats(&system.id, Bucket::TwentyMin, fresh_20m, &Stats::default()).await.unwrap();

        let removed = sweep(&store, now).await.unwrap();
        assert_eq!(removed, 2);

        let remaining_1m = store.system_stats_range(&system.id, Bucket::OneMin, now - Duration::days(1), now).await.unwrap();
        assert_eq!(remaining_1m.len(), 1);
        assert_eq!(remaining_1m[0].created_at, fresh_1m);

        let remaining_20m = store.system_stats_range(&system.id, Bucket::TwentyMin, now - Duration::days(2), now).await.unwrap();
        assert_eq!(remaining_20m.len(), 1);
        assert_eq!(remaining_20m[0].created_at, fresh_20m);
    }

    #[tokio::test]
    async fn sweep_is_a_noop_on_an_empty_store() {
        let store = memory_store().await;
        let removed = sweep(&store, Utc::now()).await.unwrap();
        assert_eq!(removed, 0);
    }
}
