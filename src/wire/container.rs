//! Per-container stats, as produced by the container inspector (C2).

use serde::{Deserialize, Serialize};

/// Container health, as reported by the container engine's health check.
/// Int-tagged on the wire (`spec.md` §6: `health∈{0..3}`), string-mapped for
/// logs/REST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContainerHealth {
    None = 0,
    Starting = 1,
    Healthy = 2,
    Unhealthy = 3,
}

impl std::fmt::Display for ContainerHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerHealth::None => "none",
            ContainerHealth::Starting => "starting",
            ContainerHealth::Healthy => "healthy",
            ContainerHealth::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}

/// One running container's delta-computed resource usage for this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub short_id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub health: ContainerHealth,
    pub cpu: f64,
    pub mem_mb: f64,
    pub net_sent: f64,
    pub net_recv: f64,
}
