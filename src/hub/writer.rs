//! Record writer (`spec.md` §4.7, component C9): the single place a fresh
//! [`SystemSnapshot`] becomes persisted rows. `spec.md` §9 turns the donor's
//! implicit "insert triggers rollup triggers alert" hook chain into this
//! explicit post-insert handler, called synchronously by whichever transport
//! (poll scheduler or push accept) just obtained a snapshot.

use crate::hub::alert;
use crate::hub::notify::Notifier;
use crate::hub::rollup;
use crate::hub::store::{Store, StoreError};
use crate::wire::{Bucket, SystemSnapshot};
use chrono::{DateTime, Utc};

/// Persist one snapshot and run everything downstream of it (`spec.md` §4.7:
/// "each insert triggers the rollup engine ... and the alert evaluator").
///
/// A store error here means the snapshot for this tick is dropped and no
/// rollup/alert work runs for it (`spec.md` §7), but it never propagates to
/// the poll scheduler or push accept task as a transport failure — the
/// snapshot was successfully obtained, only its persistence failed.
pub async fn ingest(
    store: &dyn Store,
    notifier: &dyn Notifier,
    system_id: &str,
    system_name: &str,
    snapshot: &SystemSnapshot,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    store.insert_system_stats(system_id, Bucket::OneMin, at, &snapshot.stats).await?;

    if !snapshot.containers.is_empty() {
        store.insert_container_stats(system_id, Bucket::OneMin, at, &snapshot.containers).await?;
    }

    let info = serde_json::to_value(&snapshot.info).unwrap_or(serde_json::Value::Null);
    store.mark_system_seen(system_id, &info).await?;

    rollup::cascade(store, system_id, Bucket::OneMin, at).await?;
    alert::evaluate_on_insert(store, notifier, system_id, system_name, at).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::notify::LogNotifier;
    use crate::hub::store::sqlite::SqliteStore;
    use crate::wire::{Info, Stats};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn snapshot_with_cpu(cpu: f64) -> SystemSnapshot {
        SystemSnapshot {
            info: Info {
                agent_version: "0.1.0".to_string(),
                os_family: "linux".to_string(),
                kernel: "6.1.0".to_string(),
                hostname: "box1".to_string(),
                uptime_sec: 3600,
                cpu_model: "test-cpu".to_string(),
                cores: 4,
                threads: 8,
                connection_type: crate::wire::ConnectionType::Pull,
            },
            stats: Stats { cpu, ..Stats::default() },
            containers: Vec::new(),
            smart: Vec::new(),
        }
    }

    #[tokio::test]
    async fn ingest_marks_pending_system_up_and_writes_a_1m_row() {
        let store = memory_store().await;
        let notifier = LogNotifier;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        assert_eq!(system.status, crate::hub::model::SystemStatus::Pending);

        let now = Utc::now();
        ingest(&store, &notifier, &system.id, &system.name, &snapshot_with_cpu(42.0), now).await.unwrap();

        let reloaded = store.get_system(&system.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, crate::hub::model::SystemStatus::Up);
        assert!(reloaded.last_seen.is_some());

        let rows = store
            .system_stats_range(&system.id, Bucket::OneMin, now - chrono::Duration::minutes(1), now)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload.cpu, 42.0);
    }

    #[tokio::test]
    async fn ingest_skips_container_row_when_snapshot_has_none() {
        let store = memory_store().await;
        let notifier = LogNotifier;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let now = Utc::now();

        ingest(&store, &notifier, &system.id, &system.name, &snapshot_with_cpu(10.0), now).await.unwrap();

        let rows = store
            .container_stats_in_window(&system.id, Bucket::OneMin, now - chrono::Duration::minutes(1), now)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
