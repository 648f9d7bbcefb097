//! SMART sampler (`spec.md` §4.1 "SMART").
//!
//! Shells out to `smartctl -A <device>`, the same external-helper pattern as
//! the GPU sampler. `smartctl` is slow enough (spins up real disk I/O on
//! some controllers) that results are cached per device and only refreshed
//! after [`SMART_REFRESH`] elapses; callers ask every tick but usually get
//! the cached reading back.

use crate::wire::Smart;
use std::collections::HashMap;
use std::process::Command;
use std::time::{Duration, Instant};

const SMART_REFRESH: Duration = Duration::from_secs(10 * 60);

#[derive(Default)]
pub struct SmartSampler {
    cache: HashMap<String, (Instant, Smart)>,
}

impl SmartSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a cached reading for `device` if fresh, otherwise shell out to
    /// `smartctl` and cache the result. Returns `None` if `smartctl` is
    /// unavailable or the device cannot be queried.
    pub fn sample(&mut self, device: &str) -> Option<Smart> {
        if let Some((fetched_at, reading)) = self.cache.get(device) {
            if fetched_at.elapsed() < SMART_REFRESH {
                return Some(reading.clone());
            }
        }

        let reading = query_smartctl(device)?;
        self.cache.insert(device.to_string(), (Instant::now(), reading.clone()));
        Some(reading)
    }
}

fn query_smartctl(device: &str) -> Option<Smart> {
    let path = format!("/dev/{device}");
    let output = Command::new("smartctl").args(["-A", &path]).output().ok()?;
    if output.stdout.is_empty() {
        return None;
    }
    Some(parse_smartctl_attributes(device, &String::from_utf8_lossy(&output.stdout)))
}

/// Parses the classic `smartctl -A` attribute table:
/// `ID# ATTRIBUTE_NAME ... RAW_VALUE` — we key on attribute name, value on
/// the last whitespace-separated column (the raw value).
fn parse_smartctl_attributes(device: &str, text: &str) -> Smart {
    let mut attributes = HashMap::new();
    let mut in_table = false;

    for line in text.lines() {
        if line.trim_start().starts_with("ID#") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[1].to_string();
        let raw_value = fields[9].to_string();
        attributes.insert(name, raw_value);
    }

    Smart {
        device: device.to_string(),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMARTCTL_OUTPUT: &str = "\
smartctl 7.3 2022-02-28 r5338 [x86_64-linux-6.1.0] (local build)
Copyright (C) 2002-22, Bruce Allen, Christian Franke, www.smartmontools.org

=== START OF READ SMART DATA SECTION ===
SMART Attributes Data Structure revision number: 16
Vendor Specific SMART Attributes with Thresholds:
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   100   100   010    Pre-fail  Always       -       0
  9 Power_On_Hours          0x0032   095   095   000    Old_age   Always       -       12345
194 Temperature_Celsius     0x0022   066   059   000    Old_age   Always       -       34
";

    #[test]
    fn attribute_table_parsed_into_name_keyed_map() {
        let smart = parse_smartctl_attributes("sda", SMARTCTL_OUTPUT);
        assert_eq!(smart.device, "sda");
        assert_eq!(smart.attributes.get("Power_On_Hours"), Some(&"12345".to_string()));
        assert_eq!(smart.attributes.get("Temperature_Celsius"), Some(&"34".to_string()));
    }
}
