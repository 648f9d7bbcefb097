//! Time-series read surface (`SPEC_FULL.md` §6: `GET /api/systems/{id}/stats?bucket=...`).

use crate::hub::auth::AdminAuth;
use crate::hub::store::TimeSeriesRow;
use crate::hub::HubState;
use crate::wire::{Bucket, Stats};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Bucket tag (`"1m"`, `"10m"`, ...); defaults to `1m`.
    pub bucket: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

pub async fn get_system_stats(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Path(id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<TimeSeriesRow<Stats>>>, StatusCode> {
    let bucket = match query.bucket.as_deref() {
        Some(tag) => Bucket::from_str_tag(tag).ok_or(StatusCode::BAD_REQUEST)?,
        None => Bucket::OneMin,
    };
    let until = query.until.unwrap_or_else(Utc::now);
    let since = query.since.unwrap_or(until - Duration::minutes(bucket.retention_minutes()));

    hub.store
        .system_stats_range(&id, bucket, since, until)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
