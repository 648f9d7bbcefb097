//! Poll scheduler (`spec.md` §4.6, component C8): a single fair, bounded
//! loop over the known-system set. Grounded in the donor's
//! `tokio::spawn(hub::curator::run_curator(...))` background-task style
//! (`bin/fleet_hub.rs`) — one `tokio::time::interval` loop, fan-out per tick
//! bounded by a computed batch size, each task independent and run
//! concurrently via `join_all` (no per-task `tokio::spawn`, since tasks only
//! need concurrent I/O, not separate OS threads, and borrowing `&dyn Store`/
//! `&dyn Notifier` this way avoids threading `Arc<dyn Trait>` through every
//! call site).

use crate::hub::model::{System, SystemStatus};
use crate::hub::notify::Notifier;
use crate::hub::session::SessionRegistry;
use crate::hub::store::{Store, StoreError};
use crate::hub::{alert, pull_client, writer};
use crate::wire::SystemSnapshot;
use chrono::{Duration as ChronoDuration, Utc};
use russh_keys::key::KeyPair;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A system is eligible for this tick once its `updated` timestamp is older
/// than this (`spec.md` §4.6: "~58s", just under the 60s tick so a slow
/// system doesn't fall permanently behind the round-robin).
const STALE_AFTER: ChronoDuration = ChronoDuration::seconds(58);

/// Per-poll-task deadline (`spec.md` §5: "the poll task's total deadline is
/// the tick period").
const TASK_DEADLINE: Duration = Duration::from_secs(58);

#[derive(Debug, thiserror::Error)]
enum PollError {
    #[error("pull transport error: {0}")]
    Pull(#[from] pull_client::PullClientError),
    #[error("push session error: {0}")]
    Push(#[from] crate::hub::session::SessionError),
    #[error("system has no reachable pull address and no live push session")]
    NoTransport,
}

/// Runs [`tick`] on a fixed period until the process shuts down.
pub async fn run(
    store: std::sync::Arc<dyn Store>,
    registry: std::sync::Arc<SessionRegistry>,
    notifier: std::sync::Arc<dyn Notifier>,
    hub_key: KeyPair,
    hub_version: String,
    period: Duration,
    down_after_failures: i32,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(err) = tick(
            store.as_ref(),
            registry.as_ref(),
            notifier.as_ref(),
            &hub_key,
            &hub_version,
            down_after_failures,
        )
        .await
        {
            warn!(%err, "poll scheduler tick failed to list systems");
        }
    }
}

/// One scheduling tick (`spec.md` §4.6): compute the batch size, select the
/// stalest eligible systems, and poll each concurrently.
pub async fn tick(
    store: &dyn Store,
    registry: &SessionRegistry,
    notifier: &dyn Notifier,
    hub_key: &KeyPair,
    hub_version: &str,
    down_after_failures: i32,
) -> Result<(), StoreError> {
    let all = store.list_pollable_systems(i64::MAX).await?;
    let batch_size = (all.len() as f64 / 3.0).ceil() as usize + 1;
    let now = Utc::now();

    let candidates: Vec<System> = all
        .into_iter()
        .filter(|s| now - s.updated > STALE_AFTER)
        .take(batch_size)
        .collect();

    if candidates.is_empty() {
        return Ok(());
    }
    debug!(count = candidates.len(), batch_size, "poll scheduler dispatching");

    let tasks = candidates.into_iter().map(|system| async move {
        let outcome = tokio::time::timeout(TASK_DEADLINE, fetch_one(&system, registry, hub_key, hub_version))
            .await
            .unwrap_or(Err(PollError::NoTransport));
        (system, outcome)
    });

    let results = futures::future::join_all(tasks).await;

    for (system, outcome) in results {
        if let Err(err) =
            apply_outcome(store, registry, notifier, &system, outcome, down_after_failures).await
        {
            warn!(system_id = %system.id, %err, "failed to persist poll outcome");
        }
    }

    Ok(())
}

async fn fetch_one(
    system: &System,
    registry: &SessionRegistry,
    hub_key: &KeyPair,
    hub_version: &str,
) -> Result<SystemSnapshot, PollError> {
    if let Some(push) = registry.push_handle(&system.id).await {
        return Ok(push.request_snapshot(Duration::from_secs(10)).await?);
    }

    let port = system.port.ok_or(PollError::NoTransport)?;
    Ok(pull_client::fetch_snapshot(&system.host, port, hub_key, hub_version).await?)
}

/// Apply one poll task's outcome to the registry and store: success resets
/// the failure counter and ingests the snapshot; failure increments it and,
/// at the configured threshold, flips the system to `down` and fires the
/// edge-triggered `status_down` alert (`spec.md` §4.6/§4.10).
async fn apply_outcome(
    store: &dyn Store,
    registry: &SessionRegistry,
    notifier: &dyn Notifier,
    system: &System,
    outcome: Result<SystemSnapshot, PollError>,
    down_after_failures: i32,
) -> Result<(), StoreError> {
    match outcome {
        Ok(snapshot) => {
            registry.record_success(&system.id).await;
            store.reset_consecutive_fail(&system.id).await?;
            writer::ingest(store, notifier, &system.id, &system.name, &snapshot, Utc::now()).await?;
        }
        Err(err) => {
            registry.record_failure(&system.id, &err.to_string()).await;
            let fails = store.increment_consecutive_fail(&system.id).await?;
            if fails >= down_after_failures && system.status != SystemStatus::Down {
                store.set_system_status(&system.id, SystemStatus::Down).await?;
                alert::evaluate_status_transition(store, notifier, &system.id, &system.name, Utc::now()).await?;
                info!(system_id = %system.id, fails, "system marked down after consecutive poll failures");
            } else {
                store.touch_system_updated(&system.id).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::notify::LogNotifier;
    use crate::hub::store::sqlite::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn system_with_no_port_and_no_push_session_is_counted_as_a_failure() {
        let store = memory_store().await;
        let registry = SessionRegistry::new();
        let notifier = LogNotifier;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();

        let outcome = fetch_one(&system, &registry, &dummy_key(), "0.12.0").await;
        assert!(matches!(outcome, Err(PollError::NoTransport)));

        apply_outcome(&store, &registry, &notifier, &system, outcome, 2).await.unwrap();
        let reloaded = store.get_system(&system.id).await.unwrap().unwrap();
        assert_eq!(reloaded.consecutive_fail, 1);
        assert_eq!(reloaded.status, SystemStatus::Pending);
    }

    #[tokio::test]
    async fn status_flips_to_down_at_the_configured_failure_threshold() {
        let store = memory_store().await;
        let registry = SessionRegistry::new();
        let notifier = LogNotifier;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        store.set_system_status(&system.id, SystemStatus::Up).await.unwrap();

        for _ in 0..2 {
            let system = store.get_system(&system.id).await.unwrap().unwrap();
            let outcome: Result<SystemSnapshot, PollError> = Err(PollError::NoTransport);
            apply_outcome(&store, &registry, &notifier, &system, outcome, 2).await.unwrap();
        }

        let reloaded = store.get_system(&system.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SystemStatus::Down);
    }

    fn dummy_key() -> KeyPair {
        KeyPair::generate_ed25519().expect("ed25519 keygen")
    }
}
