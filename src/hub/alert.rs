//! Alert evaluator: per-metric thresholds with sliding-window averages,
//! duration gates, dedup against re-trigger, and dispatch to a pluggable
//! [`Notifier`]. Split into small, independently testable functions
//! (`metric_mean`, `transition`) called from one per-insert orchestrating
//! function.

use crate::hub::model::{Alert, AlertHistoryRow, AlertState, Metric};
use crate::hub::notify::{Direction, NotifyEvent, Notifier};
use crate::hub::quiet_hours;
use crate::hub::store::{Store, StoreError};
use crate::wire::{Container, ContainerHealth, Stats};
use chrono::{DateTime, Duration, Utc};

/// Runs every active alert matching `system_id` against the latest insert.
/// `status_down` alerts are excluded here — they are edge-triggered on the
/// registry's own status transition, handled by [`evaluate_status_transition`].
pub async fn evaluate_on_insert(
    store: &dyn Store,
    notifier: &dyn Notifier,
    system_id: &str,
    system_name: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let alerts = store.alerts_for_system(system_id).await?;
    for alert in alerts {
        if alert.metric.is_edge_triggered() {
            continue;
        }
        let Some(mean) = metric_mean(store, system_id, alert.metric, alert.min_minutes, now).await? else {
            continue;
        };
        let crossed = if alert.metric.is_inverted() { mean <= alert.threshold } else { mean >= alert.threshold };
        transition(store, notifier, &alert, system_id, system_name, crossed, mean, now).await?;
    }
    Ok(())
}

/// `status_down` is edge-triggered on the session registry's own up→down
/// transition, not a sliding-window mean. Called by the poll scheduler
/// exactly when a system's status flips to `down`.
pub async fn evaluate_status_transition(
    store: &dyn Store,
    notifier: &dyn Notifier,
    system_id: &str,
    system_name: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let alerts = store.alerts_for_system(system_id).await?;
    for alert in alerts {
        if alert.metric != Metric::StatusDown {
            continue;
        }
        transition(store, notifier, &alert, system_id, system_name, true, 1.0, now).await?;
    }
    Ok(())
}

/// Load the most recent `min_minutes` of 1m rows for `metric` and return
/// their arithmetic mean, or `None` if fewer than `min_minutes` rows are
/// available yet.
async fn metric_mean(
    store: &dyn Store,
    system_id: &str,
    metric: Metric,
    min_minutes: i64,
    now: DateTime<Utc>,
) -> Result<Option<f64>, StoreError> {
    let since = now - Duration::minutes(min_minutes);

    if metric == Metric::ContainerUnhealthy {
        let rows = store.container_stats_in_window(system_id, crate::wire::Bucket::OneMin, since, now).await?;
        if (rows.len() as i64) < min_minutes {
            return Ok(None);
        }
        let values: Vec<f64> = rows.iter().filter_map(|r| healthy_fraction(&r.payload)).collect();
        return Ok(mean_of(&values));
    }

    let rows = store.system_stats_in_window(system_id, crate::wire::Bucket::OneMin, since, now).await?;
    if (rows.len() as i64) < min_minutes {
        return Ok(None);
    }
    let values: Vec<f64> = rows.iter().filter_map(|r| metric_value(metric, &r.payload)).collect();
    Ok(mean_of(&values))
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Extract one metric's scalar reading from a single `Stats` row.
fn metric_value(metric: Metric, stats: &Stats) -> Option<f64> {
    match metric {
        Metric::Cpu => Some(stats.cpu),
        Metric::Memory => Some(stats.mem_used_pct),
        Metric::Disk => Some(stats.disk_used_pct),
        Metric::Bandwidth => Some(stats.ns + stats.nr),
        Metric::Temperature => stats.t.values().copied().fold(None, |acc, v| match acc {
            None => Some(v),
            Some(m) => Some(m.max(v)),
        }),
        Metric::LoadAvg => Some(stats.la[0]),
        Metric::ContainerUnhealthy | Metric::StatusDown => None,
    }
}

/// Fraction of running containers reporting `healthy` (or `none`, meaning
/// "no health check configured" — treated as healthy, not unknown). `None`
/// when the tick reported no containers at all, so it doesn't pull the mean
/// toward either extreme.
fn healthy_fraction(containers: &[Container]) -> Option<f64> {
    if containers.is_empty() {
        return None;
    }
    let healthy = containers
        .iter()
        .filter(|c| matches!(c.health, ContainerHealth::Healthy | ContainerHealth::None))
        .count();
    Some(healthy as f64 / containers.len() as f64)
}

/// Apply the idle↔triggered state machine and dispatch through `notifier`,
/// gated by quiet hours. The history row and state transition always
/// happen; only the notifier call is suppressed.
async fn transition(
    store: &dyn Store,
    notifier: &dyn Notifier,
    alert: &Alert,
    system_id: &str,
    system_name: &str,
    crossed: bool,
    value: f64,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let direction = match (alert.state, crossed) {
        (AlertState::Idle, true) => {
            store.set_alert_state(&alert.id, AlertState::Triggered).await?;
            store
                .append_alert_history(&AlertHistoryRow {
                    id: uuid::Uuid::new_v4().to_string(),
                    alert_id: alert.id.clone(),
                    system: system_id.to_string(),
                    metric: alert.metric,
                    triggered_at: now,
                    resolved_at: None,
                })
                .await?;
            Direction::Raised
        }
        (AlertState::Triggered, false) => {
            store.set_alert_state(&alert.id, AlertState::Idle).await?;
            store.resolve_latest_alert_history(&alert.id, now).await?;
            Direction::Resolved
        }
        _ => return Ok(()),
    };

    let quiet_rows = store.quiet_hours_for(&alert.user, system_id).await?;
    if quiet_hours::is_suppressed(&quiet_rows, now) {
        tracing::debug!(alert_id = %alert.id, "alert event suppressed by quiet hours, not dispatched");
        return Ok(());
    }

    notifier
        .notify(&NotifyEvent {
            user: alert.user.clone(),
            system_name: system_name.to_string(),
            metric: alert.metric,
            direction,
            value,
            threshold: alert.threshold,
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::model::Metric;
    use crate::hub::notify::LogNotifier;
    use crate::hub::store::sqlite::SqliteStore;
    use crate::wire::Bucket;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn cpu_alert_triggers_then_resolves_with_one_history_row() {
        let store = memory_store().await;
        let notifier = LogNotifier;
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

        let base = Utc::now();
        let cpu_values = [70.0, 85.0, 85.0, 85.0];
        for (i, &cpu) in cpu_values.iter().enumerate() {
            let at = base + Duration::minutes(i as i64 + 1);
            let mut stats = Stats::default();
            stats.cpu = cpu;
            store.insert_system_stats(&system.id, Bucket::OneMin, at, &stats).await.unwrap();
            evaluate_on_insert(&store, &notifier, &system.id, &system.name, at).await.unwrap();
        }

        let reloaded = store.list_alerts().await.unwrap();
        let alert = reloaded.iter().find(|a| a.id == alert.id).unwrap();
        assert_eq!(alert.state, AlertState::Triggered);

        let history = store.alert_history(&alert.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].resolved_at.is_none());

        for i in 0..3 {
            let at = base + Duration::minutes(5 + i);
            let mut stats = Stats::default();
            stats.cpu = 60.0;
            store.insert_system_stats(&system.id, Bucket::OneMin, at, &stats).await.unwrap();
            evaluate_on_insert(&store, &notifier, &system.id, &system.name, at).await.unwrap();
        }

        let reloaded = store.list_alerts().await.unwrap();
        let alert = reloaded.iter().find(|a| a.id == alert.id).unwrap();
        assert_eq!(alert.state, AlertState::Idle);

        let history = store.alert_history(&alert.id).await.unwrap();
        assert_eq!(history.len(), 1, "resolving must update the existing row, not append a second");
        assert!(history[0].resolved_at.is_some());
    }

    #[tokio::test]
    async fn insufficient_rows_never_trigger() {
        let store = memory_store().await;
        let notifier = LogNotifier;
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

        let base = Utc::now();
        let mut stats = Stats::default();
        stats.cpu = 99.0;
        store.insert_system_stats(&system.id, Bucket::OneMin, base + Duration::minutes(1), &stats).await.unwrap();
        evaluate_on_insert(&store, &notifier, &system.id, &system.name, base + Duration::minutes(1)).await.unwrap();

        let reloaded = store.list_alerts().await.unwrap();
        assert_eq!(reloaded[0].state, AlertState::Idle);
    }

    #[tokio::test]
    async fn quiet_hours_suppress_dispatch_but_not_history() {
        let store = memory_store().await;
        let notifier = LogNotifier;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            user: "u1".to_string(),
            system: Some(system.id.clone()),
            metric: Metric::Cpu,
            threshold: 80.0,
            min_minutes: 1,
            state: AlertState::Idle,
        };
        store.create_alert(&alert).await.unwrap();

        let now = Utc::now();
        store
            .create_quiet_hours(&crate::hub::model::QuietHours {
                id: uuid::Uuid::new_v4().to_string(),
                user: "u1".to_string(),
                system: None,
                kind: crate::hub::model::QuietHoursKind::OneTime,
                start: (now - Duration::minutes(5)).to_rfc3339(),
                end: (now + Duration::minutes(5)).to_rfc3339(),
            })
            .await
            .unwrap();

        let mut stats = Stats::default();
        stats.cpu = 95.0;
        store.insert_system_stats(&system.id, Bucket::OneMin, now, &stats).await.unwrap();
        evaluate_on_insert(&store, &notifier, &system.id, &system.name, now).await.unwrap();

        let history = store.alert_history(&alert.id).await.unwrap();
        assert_eq!(history.len(), 1, "history is recorded even when dispatch is suppressed");
    }
}
