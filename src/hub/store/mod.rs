//! The record store: the only persistent state the hub owns (`spec.md` §5
//! "Shared resources"). `spec.md` §1 treats the record store as out of
//! scope, "the embedded record store ... treated as a record store with
//! collection/insert/query operations" — so it is expressed here as a
//! trait, not a concrete database, and the rollup/alert/retention engines
//! are written against the trait (`SPEC_FULL.md` §3).

pub mod sqlite;

use crate::hub::model::{Alert, AlertHistoryRow, Fingerprint, QuietHours, System, SystemStatus};
use crate::wire::{Bucket, Container, Stats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
}

/// One persisted `system_stats` or `container_stats` row, generic over the
/// payload type so the writer/rollup can share query plumbing.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesRow<T> {
    pub system_id: String,
    pub bucket: Bucket,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

/// The collection/insert/query surface the hub's collection scheduler,
/// rollup engine, retention sweeper, and alert evaluator are written
/// against (`SPEC_FULL.md` §3 "Store trait").
#[async_trait]
pub trait Store: Send + Sync {
    // ── systems ──────────────────────────────────────────────────────────
    async fn create_system(&self, name: &str, host: &str, port: Option<u16>) -> Result<System, StoreError>;
    async fn get_system(&self, id: &str) -> Result<Option<System>, StoreError>;
    async fn list_systems(&self) -> Result<Vec<System>, StoreError>;
    /// Systems eligible for a poll tick: not paused, ordered by `updated`
    /// ascending (`spec.md` §4.6 fairness).
    async fn list_pollable_systems(&self, limit: i64) -> Result<Vec<System>, StoreError>;
    async fn set_system_status(&self, id: &str, status: SystemStatus) -> Result<(), StoreError>;
    async fn mark_system_seen(&self, id: &str, info: &serde_json::Value) -> Result<(), StoreError>;
    async fn touch_system_updated(&self, id: &str) -> Result<(), StoreError>;
    async fn increment_consecutive_fail(&self, id: &str) -> Result<i32, StoreError>;
    async fn reset_consecutive_fail(&self, id: &str) -> Result<(), StoreError>;

    // ── fingerprints / enrollment ───────────────────────────────────────
    async fn find_fingerprint_by_token(&self, token: &str) -> Result<Option<Fingerprint>, StoreError>;
    async fn get_fingerprint(&self, system_id: &str) -> Result<Option<Fingerprint>, StoreError>;
    async fn create_system_with_fingerprint(
        &self,
        name: &str,
        host: &str,
        fingerprint_candidate: &str,
        token: &str,
    ) -> Result<System, StoreError>;
    async fn fill_fingerprint(&self, system_id: &str, fingerprint_candidate: &str) -> Result<(), StoreError>;
    async fn clear_fingerprint(&self, system_id: &str) -> Result<(), StoreError>;
    async fn set_fingerprint_blocked(&self, system_id: &str, blocked: bool) -> Result<(), StoreError>;

    // ── time series ──────────────────────────────────────────────────────
    async fn insert_system_stats(&self, system_id: &str, bucket: Bucket, at: DateTime<Utc>, stats: &Stats) -> Result<(), StoreError>;
    async fn insert_container_stats(&self, system_id: &str, bucket: Bucket, at: DateTime<Utc>, containers: &[Container]) -> Result<(), StoreError>;
    async fn system_stats_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Stats>>, StoreError>;
    async fn system_stats_range(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Stats>>, StoreError>;
    async fn container_stats_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Vec<Container>>>, StoreError>;
    async fn has_row_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn delete_system_stats_older_than(&self, bucket: Bucket, before: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn delete_container_stats_older_than(&self, bucket: Bucket, before: DateTime<Utc>) -> Result<u64, StoreError>;

    // ── alerts ───────────────────────────────────────────────────────────
    async fn create_alert(&self, alert: &Alert) -> Result<(), StoreError>;
    async fn delete_alert(&self, id: &str) -> Result<(), StoreError>;
    async fn list_alerts(&self) -> Result<Vec<Alert>, StoreError>;
    /// Alerts whose scope matches `system_id`: either pinned to it directly,
    /// or a template (`system = None`) owned by a user who owns this system.
    async fn alerts_for_system(&self, system_id: &str) -> Result<Vec<Alert>, StoreError>;
    async fn set_alert_state(&self, id: &str, state: crate::hub::model::AlertState) -> Result<(), StoreError>;

    async fn append_alert_history(&self, row: &AlertHistoryRow) -> Result<(), StoreError>;
    async fn resolve_latest_alert_history(&self, alert_id: &str, resolved_at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn alert_history(&self, alert_id: &str) -> Result<Vec<AlertHistoryRow>, StoreError>;

    // ── quiet hours ──────────────────────────────────────────────────────
    async fn create_quiet_hours(&self, q: &QuietHours) -> Result<(), StoreError>;
    async fn delete_quiet_hours(&self, id: &str) -> Result<(), StoreError>;
    async fn quiet_hours_for(&self, user: &str, system_id: &str) -> Result<Vec<QuietHours>, StoreError>;
    async fn list_quiet_hours(&self) -> Result<Vec<QuietHours>, StoreError>;
}
