//! Container inspector (`spec.md` §4.1 "Container inspector", component C2).
//!
//! Lists running containers and pulls one non-streamed stats snapshot per
//! container, the way `docker stats --no-stream` works — grounded in
//! `Rauxon-sovereign-engine`'s `docker::DockerManager`, which already wraps
//! `bollard::Docker` for container listing/inspection; this module adds the
//! stats-snapshot side that manager never needed.
//!
//! Per-container network counters are cumulative since container start, so
//! (per `spec.md` §3 "Carried from previous sample... previous per-container
//! totals") the inspector keeps the last sample's byte counts and divides
//! the delta by elapsed wall time to report a rate, the same shape as the
//! host-level network sampler's [`super::samplers::rate::RateCounter`].
//! CPU deltas don't need that bookkeeping here: Docker's non-streamed stats
//! response already carries the previous tick's counters in `precpu_stats`.

use crate::wire::{Container, ContainerHealth};
use bollard::container::{MemoryStatsStats, Stats as BollardStats};
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A single container's stats call must not stall the whole sweep
/// (`spec.md` §4.1: "the inspector MUST bound latency").
const STATS_DEADLINE: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ContainerInspectorError {
    #[error("failed to connect to Docker: {0}")]
    Connect(#[source] bollard::errors::Error),
}

struct PrevNet {
    sent: u64,
    recv: u64,
    at: Instant,
}

pub struct ContainerInspector {
    docker: Docker,
    prev_net: Mutex<HashMap<String, PrevNet>>,
}

impl ContainerInspector {
    pub fn connect() -> Result<Self, ContainerInspectorError> {
        let docker =
            Docker::connect_with_local_defaults().map_err(ContainerInspectorError::Connect)?;
        Ok(Self { docker, prev_net: Mutex::new(HashMap::new()) })
    }

    /// Snapshot every running container: identity plus one non-streamed
    /// stats sample. Containers that fail to inspect, or whose stats call
    /// exceeds [`STATS_DEADLINE`], are skipped rather than failing the whole
    /// sweep, and their network-delta memory is dropped so a slow tick
    /// doesn't poison the next one's rate with a stale baseline.
    pub async fn sample(&self) -> Vec<Container> {
        let summaries = match self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                ..Default::default()
            }))
            .await
        {
            Ok(summaries) => summaries,
            Err(_) => return Vec::new(),
        };

        let mut out = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id.clone() else {
                continue;
            };

            let stats = match tokio::time::timeout(STATS_DEADLINE, self.fetch_stats(&id)).await {
                Ok(Some(stats)) => stats,
                Ok(None) | Err(_) => {
                    self.prev_net.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
                    continue;
                }
            };

            let short_id = id.chars().take(12).collect::<String>();
            let name = summary
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| short_id.clone());
            let image = summary.image.clone().unwrap_or_default();
            let status = summary.status.clone().unwrap_or_default();
            let health = health_from_status(summary.state.as_deref().unwrap_or_default());

            let (cpu, mem_mb) = cpu_and_memory(&stats);
            let (net_sent, net_recv) = self.network_rate(&id, &stats);

            out.push(Container {
                id,
                short_id,
                name,
                image,
                status,
                health,
                cpu,
                mem_mb,
                net_sent,
                net_recv,
            });
        }

        out
    }

    async fn fetch_stats(&self, id: &str) -> Option<BollardStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        self.docker
            .stats(id, Some(options))
            .next()
            .await?
            .ok()
    }

    /// Rate since the last successful sample of this container id; zero on
    /// the first sample, since there's no prior baseline yet (`spec.md` §8:
    /// "container CPU % ... is 0 on the first sample" — the same rule
    /// applies to the network counters this module owns).
    fn network_rate(&self, id: &str, stats: &BollardStats) -> (f64, f64) {
        let (sent, recv) = cumulative_network_bytes(stats);
        let now = Instant::now();

        let mut prev_net = self.prev_net.lock().unwrap_or_else(|e| e.into_inner());
        let rate = match prev_net.get(id) {
            Some(prev) => {
                let elapsed = now.duration_since(prev.at).as_secs_f64().max(0.001);
                let sent_rate = sent.saturating_sub(prev.sent) as f64 / elapsed;
                let recv_rate = recv.saturating_sub(prev.recv) as f64 / elapsed;
                (round2(sent_rate), round2(recv_rate))
            }
            None => (0.0, 0.0),
        };
        prev_net.insert(id.to_string(), PrevNet { sent, recv, at: now });
        rate
    }
}

fn health_from_status(state: &str) -> ContainerHealth {
    match state {
        "running" => ContainerHealth::None,
        "starting" => ContainerHealth::Starting,
        "healthy" => ContainerHealth::Healthy,
        "unhealthy" => ContainerHealth::Unhealthy,
        _ => ContainerHealth::None,
    }
}

/// CPU percentage using the same delta-of-deltas formula as `docker stats`
/// (`spec.md` §4.1 "Linux form"), and memory as `usage - (cache +
/// inactive_file)` so page cache doesn't inflate the reported working set.
fn cpu_and_memory(stats: &BollardStats) -> (f64, f64) {
    let cpu_delta = stats
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(stats.precpu_stats.cpu_usage.total_usage);
    let system_delta = stats
        .cpu_stats
        .system_cpu_usage
        .unwrap_or(0)
        .saturating_sub(stats.precpu_stats.system_cpu_usage.unwrap_or(0));

    let cpu_pct = if system_delta > 0 && cpu_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * 100.0
    } else {
        0.0
    };

    let usage = stats.memory_stats.usage.unwrap_or(0);
    let cache = memory_cache_bytes(stats);
    let mem_bytes = usage.saturating_sub(cache);
    (round2(cpu_pct), mem_bytes as f64 / (1024.0 * 1024.0))
}

/// Cgroup v1 exposes `cache`, cgroup v2 exposes `inactive_file` in its place;
/// try both so the subtraction works regardless of which cgroup version the
/// host runs.
fn memory_cache_bytes(stats: &BollardStats) -> u64 {
    match &stats.memory_stats.stats {
        Some(MemoryStatsStats::V1(v1)) => v1.cache,
        Some(MemoryStatsStats::V2(v2)) => v2.inactive_file,
        None => 0,
    }
}

fn cumulative_network_bytes(stats: &BollardStats) -> (u64, u64) {
    let Some(networks) = &stats.networks else {
        return (0, 0);
    };
    let mut sent = 0u64;
    let mut recv = 0u64;
    for net in networks.values() {
        sent += net.tx_bytes;
        recv += net.rx_bytes;
    }
    (sent, recv)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_maps_known_states() {
        assert_eq!(health_from_status("running"), ContainerHealth::None);
        assert_eq!(health_from_status("unhealthy"), ContainerHealth::Unhealthy);
        assert_eq!(health_from_status("bogus"), ContainerHealth::None);
    }

    fn stats_with_deltas(cpu_delta: u64, system_delta: u64, online_cpus: u64) -> BollardStats {
        let mut stats = BollardStats::default();
        stats.cpu_stats.cpu_usage.total_usage = cpu_delta;
        stats.cpu_stats.system_cpu_usage = Some(system_delta);
        stats.cpu_stats.online_cpus = Some(online_cpus);
        stats.precpu_stats.cpu_usage.total_usage = 0;
        stats.precpu_stats.system_cpu_usage = Some(0);
        stats
    }

    #[test]
    fn fully_busy_single_core_container_reports_100_percent() {
        let stats = stats_with_deltas(1_000_000_000, 1_000_000_000, 1);
        let (cpu, _) = cpu_and_memory(&stats);
        assert_eq!(cpu, 100.0);
    }

    #[test]
    fn cpu_percent_is_not_multiplied_by_online_core_count() {
        // A container using one full core's worth of time out of a 4-core
        // host's total system time is 25% busy, not 100%: `spec.md` §4.1's
        // Linux formula has no `online_cpus` term.
        let stats = stats_with_deltas(1_000_000_000, 4_000_000_000, 4);
        let (cpu, _) = cpu_and_memory(&stats);
        assert_eq!(cpu, 25.0);
    }

    #[test]
    fn first_sample_with_no_prior_usage_is_zero() {
        let stats = stats_with_deltas(0, 0, 1);
        let (cpu, _) = cpu_and_memory(&stats);
        assert_eq!(cpu, 0.0);
    }
}
