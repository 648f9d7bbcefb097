//! Memory sampler (`spec.md` §4.1 "Memory").
//!
//! Reads `/proc/meminfo` directly, the same way the CPU sampler reads
//! `/proc/stat` — `sysinfo` folds buffers/cache into "available" in a way
//! that doesn't let us report `buff_cache` separately, which the spec
//! requires.

#[derive(Debug, thiserror::Error)]
pub enum MemorySamplerError {
    #[error("failed to read /proc/meminfo: {0}")]
    Read(#[from] std::io::Error),
    #[error("/proc/meminfo missing required field {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub used_pct: f64,
    pub buff_cache: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

pub fn sample() -> Result<MemoryReading, MemorySamplerError> {
    let contents = std::fs::read_to_string("/proc/meminfo")?;
    sample_from(&contents)
}

fn sample_from(contents: &str) -> Result<MemoryReading, MemorySamplerError> {
    let mut fields = std::collections::HashMap::new();
    for line in contents.lines() {
        if let Some((key, rest)) = line.split_once(':') {
            let kb: u64 = rest
                .trim()
                .trim_end_matches(" kB")
                .parse()
                .unwrap_or(0);
            fields.insert(key.trim(), kb);
        }
    }

    let get = |key: &'static str| -> Result<u64, MemorySamplerError> {
        fields.get(key).copied().ok_or(MemorySamplerError::MissingField(key))
    };

    let total_kb = get("MemTotal")?;
    let free_kb = get("MemFree")?;
    let buffers_kb = fields.get("Buffers").copied().unwrap_or(0);
    let cached_kb = fields.get("Cached").copied().unwrap_or(0);
    let sreclaim_kb = fields.get("SReclaimable").copied().unwrap_or(0);
    let shmem_kb = fields.get("Shmem").copied().unwrap_or(0);
    let swap_total_kb = fields.get("SwapTotal").copied().unwrap_or(0);
    let swap_free_kb = fields.get("SwapFree").copied().unwrap_or(0);

    let buff_cache_kb = (buffers_kb + cached_kb + sreclaim_kb).saturating_sub(shmem_kb);
    let used_kb = total_kb.saturating_sub(free_kb).saturating_sub(buff_cache_kb);

    let used_pct = (used_kb as f64 / total_kb.max(1) as f64 * 100.0 * 100.0).round() / 100.0;

    Ok(MemoryReading {
        total: total_kb * 1024,
        used: used_kb * 1024,
        used_pct,
        buff_cache: buff_cache_kb * 1024,
        swap_total: swap_total_kb * 1024,
        swap_used: swap_total_kb.saturating_sub(swap_free_kb) * 1024,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
MemTotal:       16384000 kB
MemFree:         2048000 kB
Buffers:          512000 kB
Cached:          4096000 kB
SReclaimable:     256000 kB
Shmem:             64000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
";

    #[test]
    fn used_pct_computed_from_used_not_free() {
        let reading = sample_from(SAMPLE).unwrap();
        // buff_cache = 512000 + 4096000 + 256000 - 64000 = 4800000
        assert_eq!(reading.buff_cache, 4_800_000 * 1024);
        // used = 16384000 - 2048000 - 4800000 = 9536000
        assert_eq!(reading.used, 9_536_000 * 1024);
        let expected_pct = (9_536_000.0 / 16_384_000.0 * 100.0 * 100.0).round() / 100.0;
        assert_eq!(reading.used_pct, expected_pct);
    }

    #[test]
    fn swap_used_is_total_minus_free() {
        let reading = sample_from(SAMPLE).unwrap();
        assert_eq!(reading.swap_used, 0);
    }
}
