//! GPU sampler (`spec.md` §4.1 "GPUs").
//!
//! Shells out to `nvidia-smi`, the same external-helper approach used for
//! SMART data, rather than linking NVML directly — avoids a hard dependency
//! on proprietary driver headers being present at build time. Absent (no
//! `nvidia-smi` on `PATH`, or it exits non-zero) yields an empty map, not
//! an error: most hosts simply have no GPU.

use crate::wire::Gpu;
use std::collections::HashMap;
use std::process::Command;

const QUERY_FIELDS: &str =
    "index,name,utilization.gpu,memory.used,memory.total,power.draw";

pub fn sample() -> HashMap<String, Gpu> {
    let output = Command::new("nvidia-smi")
        .args([
            format!("--query-gpu={QUERY_FIELDS}").as_str(),
            "--format=csv,noheader,nounits",
        ])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            parse_nvidia_smi(&String::from_utf8_lossy(&out.stdout))
        }
        _ => HashMap::new(),
    }
}

fn parse_nvidia_smi(csv: &str) -> HashMap<String, Gpu> {
    let mut out = HashMap::new();
    for line in csv.lines() {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        if fields.len() < 6 {
            continue;
        }
        let index = fields[0];
        let name = fields[1].to_string();
        let util = fields[2].parse().unwrap_or(0.0);
        let mem_used = fields[3].parse::<u64>().ok().map(|mb| mb * 1024 * 1024);
        let mem_total = fields[4].parse::<u64>().ok().map(|mb| mb * 1024 * 1024);
        let power_draw = fields[5].parse().ok();

        out.insert(
            index.to_string(),
            Gpu {
                name,
                util,
                mem_used,
                mem_total,
                power_draw,
                engines: HashMap::new(),
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_rows_into_keyed_map() {
        let csv = "0, NVIDIA GeForce RTX 4090, 42, 2048, 24564, 85.30\n";
        let gpus = parse_nvidia_smi(csv);
        let gpu = gpus.get("0").unwrap();
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(gpu.util, 42.0);
        assert_eq!(gpu.mem_used, Some(2048 * 1024 * 1024));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let gpus = parse_nvidia_smi("not,enough,fields\n");
        assert!(gpus.is_empty());
    }
}
