//! `SystemSnapshot` — the canonical payload an agent produces per tick.

use super::container::Container;
use super::info::Info;
use super::smart::Smart;
use super::stats::Stats;
use serde::{Deserialize, Serialize};

/// One complete sampling of a host at one instant (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub info: Info,
    pub stats: Stats,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub smart: Vec<Smart>,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            agent_version: String::new(),
            os_family: String::new(),
            kernel: String::new(),
            hostname: String::new(),
            uptime_sec: 0,
            cpu_model: String::new(),
            cores: 0,
            threads: 0,
            connection_type: super::info::ConnectionType::Pull,
        }
    }
}
