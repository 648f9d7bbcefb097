//! Hub-only persisted shapes (`spec.md` §3): `System`, `Fingerprint`,
//! `Alert`, `AlertHistory`, `QuietHours`. Wire-shared shapes (`SystemSnapshot`,
//! `Stats`, ...) live in [`crate::wire`]; these are the hub's own record
//! shapes, never sent to an agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored host's lifecycle state (`spec.md` §3: "exactly one status").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Pending,
    Up,
    Down,
    Paused,
}

impl SystemStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SystemStatus::Pending => "pending",
            SystemStatus::Up => "up",
            SystemStatus::Down => "down",
            SystemStatus::Paused => "paused",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => SystemStatus::Pending,
            "up" => SystemStatus::Up,
            "down" => SystemStatus::Down,
            "paused" => SystemStatus::Paused,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a monitored host (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub status: SystemStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    pub created: DateTime<Utc>,
    /// User ids with view rights. Ownership is an external-auth concern
    /// (`spec.md` §1 treats the auth provider as out of scope); we keep the
    /// minimal set the alert engine needs to resolve "all systems I own".
    pub users: Vec<String>,
    /// Most recently reported `Info` block, as JSON (`agent_version`,
    /// `os_family`, `kernel`, `hostname`, `cpu_model`, `cores`, `threads`,
    /// `connection_type`).
    pub info: Option<serde_json::Value>,
    pub consecutive_fail: i32,
}

/// `(system_id, fingerprint_string, token)` (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub system_id: String,
    /// Empty until the agent's first successful authentication.
    pub fingerprint: String,
    pub token: String,
    /// Set by an operator action; always refused regardless of fingerprint
    /// match (`spec.md` §4.5).
    pub blocked: bool,
}

/// The metric catalogue an alert can watch (`spec.md` §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
    Bandwidth,
    Temperature,
    LoadAvg,
    ContainerUnhealthy,
    StatusDown,
}

impl Metric {
    pub const fn as_str(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::Bandwidth => "bandwidth",
            Metric::Temperature => "temperature",
            Metric::LoadAvg => "loadavg",
            Metric::ContainerUnhealthy => "container_unhealthy",
            Metric::StatusDown => "status_down",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        Some(match s {
            "cpu" => Metric::Cpu,
            "memory" => Metric::Memory,
            "disk" => Metric::Disk,
            "bandwidth" => Metric::Bandwidth,
            "temperature" => Metric::Temperature,
            "loadavg" => Metric::LoadAvg,
            "container_unhealthy" => Metric::ContainerUnhealthy,
            "status_down" => Metric::StatusDown,
            _ => return None,
        })
    }

    /// Metrics whose alert condition is `mean <= threshold` rather than
    /// `mean >= threshold` (`spec.md` §4.10: "inverted").
    pub const fn is_inverted(self) -> bool {
        matches!(self, Metric::ContainerUnhealthy)
    }

    /// `status_down` is edge-triggered on the registry's own status
    /// transition, not a sliding-window mean (`spec.md` §4.10).
    pub const fn is_edge_triggered(self) -> bool {
        matches!(self, Metric::StatusDown)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Idle,
    Triggered,
}

impl AlertState {
    pub const fn as_str(self) -> &'static str {
        match self {
            AlertState::Idle => "idle",
            AlertState::Triggered => "triggered",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        Some(match s {
            "idle" => AlertState::Idle,
            "triggered" => AlertState::Triggered,
            _ => return None,
        })
    }
}

/// `(id, user, system|∅, metric, threshold, min_minutes, state)` (`spec.md` §3).
/// `system = None` means the alert is a template applied to every system the
/// user owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub user: String,
    pub system: Option<String>,
    pub metric: Metric,
    pub threshold: f64,
    pub min_minutes: i64,
    pub state: AlertState,
}

/// Append-only `(system, metric, triggered_at, resolved_at?)` (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryRow {
    pub id: String,
    pub alert_id: String,
    pub system: String,
    pub metric: Metric,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuietHoursKind {
    OneTime,
    Daily,
}

impl QuietHoursKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            QuietHoursKind::OneTime => "one_time",
            QuietHoursKind::Daily => "daily",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        Some(match s {
            "one_time" => QuietHoursKind::OneTime,
            "daily" => QuietHoursKind::Daily,
            _ => return None,
        })
    }
}

/// `(user, system|∅, kind, start, end)` (`spec.md` §3). For `daily` rows,
/// `start`/`end` are `"HH:MM"` local-time-of-day strings (possibly spanning
/// midnight); for `one_time` rows they are full RFC3339 timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub id: String,
    pub user: String,
    pub system: Option<String>,
    pub kind: QuietHoursKind,
    pub start: String,
    pub end: String,
}
