//! CPU sampler — per-core and aggregate tick-counter deltas
//! (`spec.md` §4.1 "CPU").
//!
//! Reads `/proc/stat` directly rather than going through `sysinfo`, the way
//! `Rauxon-sovereign-engine`'s `metrics::CpuSampler` does, because the spec
//! needs iowait/steal broken out per core, which `sysinfo` does not expose.

use crate::wire::CoreTimes;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CpuSamplerError {
    #[error("failed to read /proc/stat: {0}")]
    Read(#[from] std::io::Error),
    #[error("/proc/stat had no parseable cpu lines")]
    Unparseable,
}

#[derive(Debug, Clone, Copy, Default)]
struct Jiffies {
    user: u64,
    nice: u64,
    system: u64,
    idle: u64,
    iowait: u64,
    irq: u64,
    softirq: u64,
    steal: u64,
}

impl Jiffies {
    fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq + self.steal
    }

    fn parse(fields: &[u64]) -> Option<Self> {
        Some(Self {
            user: *fields.first()?,
            nice: *fields.get(1)?,
            system: *fields.get(2)?,
            idle: *fields.get(3)?,
            iowait: fields.get(4).copied().unwrap_or(0),
            irq: fields.get(5).copied().unwrap_or(0),
            softirq: fields.get(6).copied().unwrap_or(0),
            steal: fields.get(7).copied().unwrap_or(0),
        })
    }
}

/// CPU percentages for the whole host plus per-core breakdown.
#[derive(Debug, Clone, Default)]
pub struct CpuReading {
    pub total: f64,
    pub user: f64,
    pub system: f64,
    pub iowait: f64,
    pub steal: f64,
    pub per_core: HashMap<String, CoreTimes>,
}

#[derive(Default)]
pub struct CpuSampler {
    prev_total: Option<Jiffies>,
    prev_cores: HashMap<String, Jiffies>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample current jiffie counters and compute a delta against the
    /// previous call. Returns `Ok(None)` on the first call (no delta yet).
    pub fn sample(&mut self) -> Result<Option<CpuReading>, CpuSamplerError> {
        let contents = std::fs::read_to_string("/proc/stat")?;
        self.sample_from(&contents)
    }

    fn sample_from(&mut self, contents: &str) -> Result<Option<CpuReading>, CpuSamplerError> {
        let mut total_line: Option<Jiffies> = None;
        let mut core_lines: HashMap<String, Jiffies> = HashMap::new();

        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("cpu ") {
                let fields = parse_fields(rest);
                total_line = Jiffies::parse(&fields);
            } else if let Some(rest) = line.strip_prefix("cpu") {
                if let Some(idx_end) = rest.find(' ') {
                    let label = format!("cpu{}", &rest[..idx_end]);
                    let fields = parse_fields(&rest[idx_end + 1..]);
                    if let Some(j) = Jiffies::parse(&fields) {
                        core_lines.insert(label, j);
                    }
                }
            }
        }

        let total_line = total_line.ok_or(CpuSamplerError::Unparseable)?;

        let prev_total = match self.prev_total.replace(total_line) {
            Some(p) => p,
            None => {
                self.prev_cores = core_lines;
                return Ok(None);
            }
        };

        let d_total = total_line.total().saturating_sub(prev_total.total());
        if d_total == 0 {
            self.prev_cores = core_lines;
            return Ok(None);
        }

        let pct = |busy: u64| (busy as f64 / d_total as f64) * 100.0;
        let d_user = total_line.user.saturating_sub(prev_total.user);
        let d_system = total_line.system.saturating_sub(prev_total.system);
        let d_iowait = total_line.iowait.saturating_sub(prev_total.iowait);
        let d_steal = total_line.steal.saturating_sub(prev_total.steal);
        let d_idle = total_line.idle.saturating_sub(prev_total.idle);
        let busy = d_total.saturating_sub(d_idle);

        let mut per_core = HashMap::with_capacity(core_lines.len());
        for (label, cur) in &core_lines {
            if let Some(prev) = self.prev_cores.get(label) {
                let d_total_core = cur.total().saturating_sub(prev.total());
                if d_total_core == 0 {
                    continue;
                }
                let pct_core = |busy: u64| (busy as f64 / d_total_core as f64) * 100.0;
                per_core.insert(
                    label.clone(),
                    CoreTimes {
                        user: pct_core(cur.user.saturating_sub(prev.user)),
                        system: pct_core(cur.system.saturating_sub(prev.system)),
                        iowait: pct_core(cur.iowait.saturating_sub(prev.iowait)),
                        steal: pct_core(cur.steal.saturating_sub(prev.steal)),
                    },
                );
            }
        }

        self.prev_cores = core_lines;

        Ok(Some(CpuReading {
            total: round2(pct(busy)),
            user: round2(pct(d_user)),
            system: round2(pct(d_system)),
            iowait: round2(pct(d_iowait)),
            steal: round2(pct(d_steal)),
            per_core,
        }))
    }
}

fn parse_fields(s: &str) -> Vec<u64> {
    s.split_whitespace().filter_map(|t| t.parse().ok()).collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_1: &str = "cpu  100 0 50 800 10 0 5 2 0 0\ncpu0 50 0 25 400 5 0 2 1 0 0\ncpu1 50 0 25 400 5 0 3 1 0 0\n";
    const SAMPLE_2: &str = "cpu  200 0 100 1600 20 0 10 4 0 0\ncpu0 100 0 50 800 10 0 4 2 0 0\ncpu1 100 0 50 800 10 0 6 2 0 0\n";

    #[test]
    fn first_sample_returns_none() {
        let mut sampler = CpuSampler::new();
        assert!(sampler.sample_from(SAMPLE_1).unwrap().is_none());
    }

    #[test]
    fn second_sample_computes_delta_percentages() {
        let mut sampler = CpuSampler::new();
        sampler.sample_from(SAMPLE_1).unwrap();
        let reading = sampler.sample_from(SAMPLE_2).unwrap().unwrap();

        // d_total = 967 (sum of all deltas), d_idle = 800 -> busy = 167
        assert!((reading.total - (167.0 / 967.0 * 100.0)).abs() < 0.01);
        assert_eq!(reading.per_core.len(), 2);
    }

    #[test]
    fn cpu_percentages_never_exceed_hundred() {
        let mut sampler = CpuSampler::new();
        sampler.sample_from(SAMPLE_1).unwrap();
        let reading = sampler.sample_from(SAMPLE_2).unwrap().unwrap();
        let sum = reading.user + reading.system + reading.iowait + reading.steal;
        assert!(sum <= 100.01, "components summed to {sum}");
    }
}
