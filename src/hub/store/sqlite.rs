//! `sqlx`-backed [`Store`] implementation, single embedded SQLite database
//! (`SPEC_FULL.md` §3: deviation from the donor's Postgres, since this
//! hub is a single embedded server rather than a multi-tenant SaaS).

use super::{Store, StoreError, TimeSeriesRow};
use crate::hub::model::{
    Alert, AlertHistoryRow, AlertState, Fingerprint, Metric, QuietHours, QuietHoursKind, System,
    SystemStatus,
};
use crate::wire::{Bucket, Container, Stats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_system(row: &sqlx::sqlite::SqliteRow) -> Result<System, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let users_raw: String = row.try_get("users")?;
    let info_raw: Option<String> = row.try_get("info")?;
    let last_seen_raw: Option<String> = row.try_get("last_seen")?;
    let updated_raw: String = row.try_get("updated")?;
    let created_raw: String = row.try_get("created")?;

    Ok(System {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        host: row.try_get("host")?,
        port: row.try_get::<Option<i64>, _>("port")?.map(|p| p as u16),
        status: SystemStatus::from_str_tag(&status_raw).unwrap_or(SystemStatus::Pending),
        last_seen: last_seen_raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
        updated: DateTime::parse_from_rfc3339(&updated_raw)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        created: DateTime::parse_from_rfc3339(&created_raw)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        users: serde_json::from_str(&users_raw).unwrap_or_default(),
        info: info_raw.and_then(|s| serde_json::from_str(&s).ok()),
        consecutive_fail: row.try_get::<i64, _>("consecutive_fail")? as i32,
    })
}

fn row_to_fingerprint(row: &sqlx::sqlite::SqliteRow) -> Result<Fingerprint, StoreError> {
    Ok(Fingerprint {
        system_id: row.try_get("system_id")?,
        fingerprint: row.try_get("fingerprint")?,
        token: row.try_get("token")?,
        blocked: row.try_get::<i64, _>("blocked")? != 0,
    })
}

fn row_to_stats(row: &sqlx::sqlite::SqliteRow) -> Result<TimeSeriesRow<Stats>, StoreError> {
    let bucket_raw: String = row.try_get("bucket")?;
    let created_raw: String = row.try_get("created_at")?;
    let stats_raw: String = row.try_get("stats")?;
    Ok(TimeSeriesRow {
        system_id: row.try_get("system_id")?,
        bucket: Bucket::from_str_tag(&bucket_raw).unwrap_or(Bucket::OneMin),
        created_at: DateTime::parse_from_rfc3339(&created_raw)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        payload: serde_json::from_str(&stats_raw).map_err(|e| StoreError::Conflict(e.to_string()))?,
    })
}

fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<Alert, StoreError> {
    let metric_raw: String = row.try_get("metric")?;
    let state_raw: String = row.try_get("state")?;
    Ok(Alert {
        id: row.try_get("id")?,
        user: row.try_get("user")?,
        system: row.try_get("system")?,
        metric: Metric::from_str_tag(&metric_raw).unwrap_or(Metric::Cpu),
        threshold: row.try_get("threshold")?,
        min_minutes: row.try_get("min_minutes")?,
        state: AlertState::from_str_tag(&state_raw).unwrap_or(AlertState::Idle),
    })
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> Result<AlertHistoryRow, StoreError> {
    let metric_raw: String = row.try_get("metric")?;
    let triggered_raw: String = row.try_get("triggered_at")?;
    let resolved_raw: Option<String> = row.try_get("resolved_at")?;
    Ok(AlertHistoryRow {
        id: row.try_get("id")?,
        alert_id: row.try_get("alert_id")?,
        system: row.try_get("system")?,
        metric: Metric::from_str_tag(&metric_raw).unwrap_or(Metric::Cpu),
        triggered_at: DateTime::parse_from_rfc3339(&triggered_raw)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        resolved_at: resolved_raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
    })
}

fn row_to_containers(row: &sqlx::sqlite::SqliteRow) -> Result<TimeSeriesRow<Vec<Container>>, StoreError> {
    let bucket_raw: String = row.try_get("bucket")?;
    let created_raw: String = row.try_get("created_at")?;
    let containers_raw: String = row.try_get("containers")?;
    Ok(TimeSeriesRow {
        system_id: row.try_get("system_id")?,
        bucket: Bucket::from_str_tag(&bucket_raw).unwrap_or(Bucket::OneMin),
        created_at: DateTime::parse_from_rfc3339(&created_raw)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        payload: serde_json::from_str(&containers_raw).map_err(|e| StoreError::Conflict(e.to_string()))?,
    })
}

fn row_to_quiet_hours(row: &sqlx::sqlite::SqliteRow) -> Result<QuietHours, StoreError> {
    let kind_raw: String = row.try_get("kind")?;
    Ok(QuietHours {
        id: row.try_get("id")?,
        user: row.try_get("user")?,
        system: row.try_get("system")?,
        kind: QuietHoursKind::from_str_tag(&kind_raw).unwrap_or(QuietHoursKind::OneTime),
        start: row.try_get("start")?,
        end: row.try_get("end")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_system(&self, name: &str, host: &str, port: Option<u16>) -> Result<System, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO systems (id, name, host, port, status, updated, created, users) \
             VALUES (?, ?, ?, ?, 'pending', ?, ?, '[]')",
        )
        .bind(&id)
        .bind(name)
        .bind(host)
        .bind(port.map(|p| p as i64))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(System {
            id,
            name: name.to_string(),
            host: host.to_string(),
            port,
            status: SystemStatus::Pending,
            last_seen: None,
            updated: now,
            created: now,
            users: Vec::new(),
            info: None,
            consecutive_fail: 0,
        })
    }

    async fn get_system(&self, id: &str) -> Result<Option<System>, StoreError> {
        let row = sqlx::query("SELECT * FROM systems WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_system).transpose()
    }

    async fn list_systems(&self) -> Result<Vec<System>, StoreError> {
        let rows = sqlx::query("SELECT * FROM systems ORDER BY name").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_system).collect()
    }

    async fn list_pollable_systems(&self, limit: i64) -> Result<Vec<System>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM systems WHERE status != 'paused' ORDER BY updated ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_system).collect()
    }

    async fn set_system_status(&self, id: &str, status: SystemStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE systems SET status = ?, updated = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_system_seen(&self, id: &str, info: &serde_json::Value) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE systems SET last_seen = ?, updated = ?, info = ?, status = CASE WHEN status = 'pending' THEN 'up' ELSE status END WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(info.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_system_updated(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE systems SET updated = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_consecutive_fail(&self, id: &str) -> Result<i32, StoreError> {
        sqlx::query("UPDATE systems SET consecutive_fail = consecutive_fail + 1, updated = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        let count: i64 = sqlx::query_scalar("SELECT consecutive_fail FROM systems WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as i32)
    }

    async fn reset_consecutive_fail(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE systems SET consecutive_fail = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_fingerprint_by_token(&self, token: &str) -> Result<Option<Fingerprint>, StoreError> {
        let row = sqlx::query("SELECT * FROM fingerprints WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_fingerprint).transpose()
    }

    async fn get_fingerprint(&self, system_id: &str) -> Result<Option<Fingerprint>, StoreError> {
        let row = sqlx::query("SELECT * FROM fingerprints WHERE system_id = ?")
            .bind(system_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_fingerprint).transpose()
    }

    async fn create_system_with_fingerprint(
        &self,
        name: &str,
        host: &str,
        fingerprint_candidate: &str,
        token: &str,
    ) -> Result<System, StoreError> {
        let system = self.create_system(name, host, None).await?;
        sqlx::query("INSERT INTO fingerprints (system_id, fingerprint, token, blocked) VALUES (?, ?, ?, 0)")
            .bind(&system.id)
            .bind(fingerprint_candidate)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(system)
    }

    async fn fill_fingerprint(&self, system_id: &str, fingerprint_candidate: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE fingerprints SET fingerprint = ? WHERE system_id = ? AND fingerprint = ''")
            .bind(fingerprint_candidate)
            .bind(system_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_fingerprint(&self, system_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE fingerprints SET fingerprint = '' WHERE system_id = ?")
            .bind(system_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_fingerprint_blocked(&self, system_id: &str, blocked: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE fingerprints SET blocked = ? WHERE system_id = ?")
            .bind(blocked as i64)
            .bind(system_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_system_stats(&self, system_id: &str, bucket: Bucket, at: DateTime<Utc>, stats: &Stats) -> Result<(), StoreError> {
        let payload = serde_json::to_string(stats).map_err(|e| StoreError::Conflict(e.to_string()))?;
        sqlx::query("INSERT INTO system_stats (system_id, bucket, created_at, stats) VALUES (?, ?, ?, ?)")
            .bind(system_id)
            .bind(bucket.as_str())
            .bind(at.to_rfc3339())
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_container_stats(&self, system_id: &str, bucket: Bucket, at: DateTime<Utc>, containers: &[Container]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(containers).map_err(|e| StoreError::Conflict(e.to_string()))?;
        sqlx::query("INSERT INTO container_stats (system_id, bucket, created_at, containers) VALUES (?, ?, ?, ?)")
            .bind(system_id)
            .bind(bucket.as_str())
            .bind(at.to_rfc3339())
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn system_stats_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Stats>>, StoreError> {
        self.system_stats_range(system_id, bucket, since, until).await
    }

    async fn system_stats_range(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Stats>>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM system_stats WHERE system_id = ? AND bucket = ? AND created_at > ? AND created_at <= ? ORDER BY created_at ASC",
        )
        .bind(system_id)
        .bind(bucket.as_str())
        .bind(since.to_rfc3339())
        .bind(until.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_stats).collect()
    }

    async fn container_stats_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<TimeSeriesRow<Vec<Container>>>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM container_stats WHERE system_id = ? AND bucket = ? AND created_at > ? AND created_at <= ? ORDER BY created_at ASC",
        )
        .bind(system_id)
        .bind(bucket.as_str())
        .bind(since.to_rfc3339())
        .bind(until.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_containers).collect()
    }

    async fn has_row_in_window(&self, system_id: &str, bucket: Bucket, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM system_stats WHERE system_id = ? AND bucket = ? AND created_at > ? AND created_at <= ?",
        )
        .bind(system_id)
        .bind(bucket.as_str())
        .bind(since.to_rfc3339())
        .bind(until.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn delete_system_stats_older_than(&self, bucket: Bucket, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM system_stats WHERE bucket = ? AND created_at < ?")
            .bind(bucket.as_str())
            .bind(before.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_container_stats_older_than(&self, bucket: Bucket, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM container_stats WHERE bucket = ? AND created_at < ?")
            .bind(bucket.as_str())
            .bind(before.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO alerts (id, user, system, metric, threshold, min_minutes, state) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.user)
        .bind(&alert.system)
        .bind(alert.metric.as_str())
        .bind(alert.threshold)
        .bind(alert.min_minutes)
        .bind(alert.state.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                "an alert for this (user, system, metric) already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_alert(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM alerts WHERE id = ?").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query("SELECT * FROM alerts").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_alert).collect()
    }

    async fn alerts_for_system(&self, system_id: &str) -> Result<Vec<Alert>, StoreError> {
        let system = self.get_system(system_id).await?.ok_or(StoreError::NotFound)?;
        let rows = sqlx::query("SELECT * FROM alerts WHERE system = ?")
            .bind(system_id)
            .fetch_all(&self.pool)
            .await?;
        let mut direct: Vec<Alert> = rows.iter().map(row_to_alert).collect::<Result<_, _>>()?;

        if !system.users.is_empty() {
            let template_rows = sqlx::query("SELECT * FROM alerts WHERE system IS NULL").fetch_all(&self.pool).await?;
            for row in &template_rows {
                let alert = row_to_alert(row)?;
                if system.users.contains(&alert.user) {
                    direct.push(alert);
                }
            }
        }
        Ok(direct)
    }

    async fn set_alert_state(&self, id: &str, state: AlertState) -> Result<(), StoreError> {
        sqlx::query("UPDATE alerts SET state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_alert_history(&self, row: &AlertHistoryRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alert_history (id, alert_id, system, metric, triggered_at, resolved_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.alert_id)
        .bind(&row.system)
        .bind(row.metric.as_str())
        .bind(row.triggered_at.to_rfc3339())
        .bind(row.resolved_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve_latest_alert_history(&self, alert_id: &str, resolved_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE alert_history SET resolved_at = ? WHERE id = ( \
                SELECT id FROM alert_history WHERE alert_id = ? AND resolved_at IS NULL \
                ORDER BY triggered_at DESC LIMIT 1 \
             )",
        )
        .bind(resolved_at.to_rfc3339())
        .bind(alert_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn alert_history(&self, alert_id: &str) -> Result<Vec<AlertHistoryRow>, StoreError> {
        let rows = sqlx::query("SELECT * FROM alert_history WHERE alert_id = ? ORDER BY triggered_at DESC")
            .bind(alert_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_history).collect()
    }

    async fn create_quiet_hours(&self, q: &QuietHours) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO quiet_hours (id, user, system, kind, start, \"end\") VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&q.id)
            .bind(&q.user)
            .bind(&q.system)
            .bind(q.kind.as_str())
            .bind(&q.start)
            .bind(&q.end)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_quiet_hours(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM quiet_hours WHERE id = ?").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn quiet_hours_for(&self, user: &str, system_id: &str) -> Result<Vec<QuietHours>, StoreError> {
        let rows = sqlx::query("SELECT * FROM quiet_hours WHERE user = ? AND (system IS NULL OR system = ?)")
            .bind(user)
            .bind(system_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_quiet_hours).collect()
    }

    async fn list_quiet_hours(&self) -> Result<Vec<QuietHours>, StoreError> {
        let rows = sqlx::query("SELECT * FROM quiet_hours").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_quiet_hours).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn create_and_fetch_system() {
        let store = memory_store().await;
        let system = store.create_system("box1", "10.0.0.1", Some(45876)).await.unwrap();
        let fetched = store.get_system(&system.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "box1");
        assert_eq!(fetched.status, SystemStatus::Pending);
    }

    #[tokio::test]
    async fn alert_uniqueness_enforced_per_system() {
        let store = memory_store().await;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            user: "u1".to_string(),
            system: Some(system.id.clone()),
            metric: Metric::Cpu,
            threshold: 80.0,
            min_minutes: 3,
            state: AlertState::Idle,
        };
        store.create_alert(&alert).await.unwrap();

        let dup = Alert { id: uuid::Uuid::new_v4().to_string(), ..alert };
        let err = store.create_alert(&dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
