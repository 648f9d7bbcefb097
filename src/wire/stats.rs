//! The `Stats` block: one scalar/map snapshot of host resource usage.
//!
//! Every field here is either a *mean-aggregated* scalar/map (rolled up by
//! arithmetic mean across source rows) or a *max-aggregated* one (rolled up
//! by elementwise maximum). Which kind a field is belongs to the schema, not
//! to a naming convention — see `hub::rollup::AGGREGATE_TABLE`, which is the
//! single source of truth the rollup engine dispatches from (`SPEC_FULL.md`
//! §4.8 / §9 "dynamic numeric-field averaging via reflection").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-core tick percentages (`spec.md` §3: "per-core map keys are canonical").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreTimes {
    pub user: f64,
    pub system: f64,
    pub iowait: f64,
    pub steal: f64,
}

/// Extra filesystem usage, keyed by device basename (not mount path).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraFs {
    pub total: u64,
    pub used: u64,
    pub used_pct: f64,
    pub read: f64,
    pub write: f64,
    pub inodes_total: u64,
    pub inodes_used: u64,
}

/// One GPU's utilization/memory/power reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gpu {
    pub name: String,
    pub util: f64,
    pub mem_used: Option<u64>,
    pub mem_total: Option<u64>,
    pub power_draw: Option<f64>,
    pub engines: HashMap<String, f64>,
}

/// Battery charge state. Int-tagged on the wire, string-mapped for logs/REST
/// (`spec.md` §9: "enum by integer in wire, string in log").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BatteryState {
    Unknown = 0,
    Charging = 1,
    Discharging = 2,
    Empty = 3,
    Full = 4,
    NotCharging = 5,
}

impl std::fmt::Display for BatteryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatteryState::Unknown => "unknown",
            BatteryState::Charging => "charging",
            BatteryState::Discharging => "discharging",
            BatteryState::Empty => "empty",
            BatteryState::Full => "full",
            BatteryState::NotCharging => "not_charging",
        };
        write!(f, "{s}")
    }
}

/// The resource-usage payload of one `SystemSnapshot`.
///
/// Fields use bytes as the canonical unit for anything byte-denominated
/// (`SPEC_FULL.md`/`spec.md` §9: "the canonical internal representation is
/// bytes"); legacy-JSON producers that report megabytes must convert on
/// decode, never on encode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    // ── CPU ──────────────────────────────────────────────────────────────
    pub cpu: f64,
    pub cpuu: f64,
    pub cpus: f64,
    pub cpui: f64,
    pub cpust: f64,
    pub cpuc: HashMap<String, CoreTimes>,

    // ── Memory ───────────────────────────────────────────────────────────
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_used_pct: f64,
    pub buff_cache: u64,
    pub swap_total: u64,
    pub swap_used: u64,

    // ── Root disk ────────────────────────────────────────────────────────
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_used_pct: f64,
    pub dr: f64,
    pub dw: f64,
    pub dio: [u64; 2],
    /// Per-subinterval maximum of `dio`. Absent when the producing agent is
    /// too old to compute it — never coerced to zero (`spec.md` §9).
    pub diom: Option<[u64; 2]>,

    // ── Extra filesystems ────────────────────────────────────────────────
    pub efs: HashMap<String, ExtraFs>,

    // ── Network ──────────────────────────────────────────────────────────
    pub ns: f64,
    pub nr: f64,
    pub b: [u64; 2],
    /// Per-subinterval maximum of `b`. See `diom` for the absent-vs-zero rule.
    pub bm: Option<[u64; 2]>,

    // ── Temperatures / GPUs / load / battery ─────────────────────────────
    pub t: HashMap<String, f64>,
    pub g: HashMap<String, Gpu>,
    pub la: [f64; 3],
    pub bat: Option<(f64, BatteryState)>,
    pub thread_count: u32,
}
