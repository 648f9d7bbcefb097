//! Agent core (`spec.md` §4.2, component C3): owns one instance of every
//! sampler and assembles a [`SystemSnapshot`] per reporting tick, the way
//! the donor crate's metrics loop fans out to each `*Sampler` and joins the
//! results before handing them to a transport.

pub mod config;
pub mod containers;
pub mod samplers;
pub mod transport;

use crate::wire::{ConnectionType, ExtraFs, Info, Smart, Stats, SystemSnapshot};
use config::AgentConfig;
use containers::ContainerInspector;
use samplers::{battery, cpu, disk, diskio, gpu, loadavg, memory, network, smart, temperature};
use std::collections::HashMap;
use std::time::Instant;
use sysinfo::System;

pub struct AgentCore {
    config: AgentConfig,
    cpu_sampler: cpu::CpuSampler,
    disk_io: diskio::DiskIoSampler,
    net: network::NetworkSampler,
    smart: smart::SmartSampler,
    containers: Option<ContainerInspector>,
    mounts_cache: Vec<disk::MountEntry>,
    last_collect: Option<Instant>,
    started_at: Instant,
    cpu_model: String,
    cores: u32,
    threads: u32,
    os_family: String,
    kernel: String,
    hostname: String,
}

impl AgentCore {
    pub fn new(config: AgentConfig) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let containers = ContainerInspector::connect().ok();
        let mounts_cache = disk::read_mounts().unwrap_or_default();

        let cores = sys.physical_core_count().unwrap_or(sys.cpus().len()) as u32;
        let threads = sys.cpus().len() as u32;
        let cpu_model = sys
            .cpus()
            .first()
            .map(|c| c.brand().to_string())
            .unwrap_or_default();

        Self {
            config,
            cpu_sampler: cpu::CpuSampler::new(),
            disk_io: diskio::DiskIoSampler::new(),
            net: network::NetworkSampler::new(),
            smart: smart::SmartSampler::new(),
            containers,
            mounts_cache,
            last_collect: None,
            started_at: Instant::now(),
            cpu_model,
            cores,
            threads,
            os_family: System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Runs on a short fixed cadence between reporting ticks so the
    /// rate-based samplers can compute a true per-subinterval maximum.
    pub fn tick(&mut self) {
        let root_name = self
            .mounts_cache
            .first()
            .map(|m| disk::device_basename(&m.device))
            .unwrap_or_default();
        if !root_name.is_empty() {
            let _ = self.disk_io.tick(&[root_name]);
        }
        let _ = self.net.tick();
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Assemble one complete snapshot for the given connection type.
    pub async fn snapshot(&mut self, connection_type: ConnectionType) -> SystemSnapshot {
        let now = Instant::now();
        let elapsed = self
            .last_collect
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .unwrap_or(1.0)
            .max(0.001);
        self.last_collect = Some(now);

        let info = Info {
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            os_family: self.os_family.clone(),
            kernel: self.kernel.clone(),
            hostname: self.hostname.clone(),
            uptime_sec: self.started_at.elapsed().as_secs(),
            cpu_model: self.cpu_model.clone(),
            cores: self.cores,
            threads: self.threads,
            connection_type,
        };

        let stats = self.collect_stats(elapsed);
        let containers = match &self.containers {
            Some(inspector) => inspector.sample().await,
            None => Vec::new(),
        };
        let smart = self.collect_smart();

        SystemSnapshot {
            info,
            stats,
            containers,
            smart,
        }
    }

    fn collect_stats(&mut self, elapsed: f64) -> Stats {
        let cpu_reading = self.cpu_sampler.sample().ok().flatten();
        let mem_reading = memory::sample().ok();
        let load = loadavg::sample().unwrap_or_default();
        let bat = battery::sample();
        let temps = temperature::sample().unwrap_or_default();
        let gpus = if self.config.gpu_enabled {
            gpu::sample()
        } else {
            HashMap::new()
        };

        let mounts = disk::read_mounts().unwrap_or_else(|_| self.mounts_cache.clone());
        let root = disk::resolve_root(&mounts, self.config.filesystem.as_deref());
        let extras = disk::resolve_extra(&mounts, &self.config.extra_filesystems);

        let (disk_total, disk_used, disk_used_pct, root_name) = match root {
            Some(entry) => {
                let name = disk::device_basename(&entry.device);
                let usage = disk::usage_for_mount(&entry.mount_point).unwrap_or_default();
                (usage.total, usage.used, usage.used_pct, name)
            }
            None => (0, 0, 0.0, String::new()),
        };

        let io = if root_name.is_empty() {
            None
        } else {
            self.disk_io.collect(&root_name, elapsed, true).ok()
        };

        let mut efs = HashMap::new();
        for entry in &extras {
            let name = disk::device_basename(&entry.device);
            let usage = disk::usage_for_mount(&entry.mount_point).unwrap_or_default();
            let rate = self
                .disk_io
                .collect(&name, elapsed, false)
                .unwrap_or_default();
            efs.insert(
                name,
                ExtraFs {
                    total: usage.total,
                    used: usage.used,
                    used_pct: usage.used_pct,
                    read: rate.read_rate,
                    write: rate.write_rate,
                    inodes_total: usage.inodes_total,
                    inodes_used: usage.inodes_used,
                },
            );
        }

        let net = self.net.collect(elapsed).unwrap_or_default();

        Stats {
            cpu: cpu_reading.as_ref().map(|r| r.total).unwrap_or(0.0),
            cpuu: cpu_reading.as_ref().map(|r| r.user).unwrap_or(0.0),
            cpus: cpu_reading.as_ref().map(|r| r.system).unwrap_or(0.0),
            cpui: cpu_reading.as_ref().map(|r| r.iowait).unwrap_or(0.0),
            cpust: cpu_reading.as_ref().map(|r| r.steal).unwrap_or(0.0),
            cpuc: cpu_reading.map(|r| r.per_core).unwrap_or_default(),

            mem_total: mem_reading.map(|m| m.total).unwrap_or(0),
            mem_used: mem_reading.map(|m| m.used).unwrap_or(0),
            mem_used_pct: mem_reading.map(|m| m.used_pct).unwrap_or(0.0),
            buff_cache: mem_reading.map(|m| m.buff_cache).unwrap_or(0),
            swap_total: mem_reading.map(|m| m.swap_total).unwrap_or(0),
            swap_used: mem_reading.map(|m| m.swap_used).unwrap_or(0),

            disk_total,
            disk_used,
            disk_used_pct,
            dr: io.map(|r| r.read_rate).unwrap_or(0.0),
            dw: io.map(|r| r.write_rate).unwrap_or(0.0),
            dio: io.map(|r| [r.read_total, r.write_total]).unwrap_or([0, 0]),
            diom: io.and_then(|r| r.max),

            efs,

            ns: net.sent_rate,
            nr: net.recv_rate,
            b: [net.sent_total, net.recv_total],
            bm: Some(net.max),

            t: temps,
            g: gpus,
            la: load,
            bat,
            thread_count: self.threads,
        }
    }

    fn collect_smart(&mut self) -> Vec<Smart> {
        let devices: Vec<String> = self
            .mounts_cache
            .iter()
            .map(|m| disk::device_basename(&m.device))
            .collect();
        devices
            .iter()
            .filter_map(|device| self.smart.sample(device))
            .collect()
    }
}
