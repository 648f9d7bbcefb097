//! Alert dispatch sink: events are handed to a notifier abstraction with no
//! opinion on transport. The only implementation shipped here logs the
//! event; real transports (email, webhook) are out of scope.

use crate::hub::model::Metric;
use async_trait::async_trait;

/// Which way an alert crossed its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Raised,
    Resolved,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Raised => write!(f, "raised"),
            Direction::Resolved => write!(f, "resolved"),
        }
    }
}

/// One dispatchable event, already past the quiet-hours gate.
#[derive(Debug, Clone)]
pub struct NotifyEvent {
    pub user: String,
    pub system_name: String,
    pub metric: Metric,
    pub direction: Direction,
    pub value: f64,
    pub threshold: f64,
}

/// Implementations own their own transport and must not revert the alert's
/// state transition on failure — the caller has already committed the
/// transition before calling this.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent);
}

/// The only shipped implementation: logs the event at `warn` level. A
/// production deployment swaps this for its own `Notifier`.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &NotifyEvent) {
        tracing::warn!(
            user = %event.user,
            system = %event.system_name,
            metric = %event.metric,
            direction = %event.direction,
            value = event.value,
            threshold = event.threshold,
            "alert event"
        );
    }
}
