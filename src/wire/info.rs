//! Agent identity block carried on every snapshot.

use serde::{Deserialize, Serialize};

/// Transport a snapshot was produced for/by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Pull,
    Push,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Pull => write!(f, "pull"),
            ConnectionType::Push => write!(f, "push"),
        }
    }
}

/// Static-ish host identity, refreshed once per snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub agent_version: String,
    pub os_family: String,
    pub kernel: String,
    pub hostname: String,
    pub uptime_sec: u64,
    pub cpu_model: String,
    pub cores: u32,
    pub threads: u32,
    pub connection_type: ConnectionType,
}
