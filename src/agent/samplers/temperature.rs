//! Temperature sampler (`spec.md` §4.1 "Temperatures").
//!
//! Walks `/sys/class/hwmon/*/temp*_input`, labelling each reading from the
//! matching `temp*_label` file (falling back to the hwmon device `name`).
//! Values are millidegrees Celsius on sysfs; reported in whole degrees.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TemperatureSamplerError {
    #[error("failed to read hwmon tree: {0}")]
    Read(#[from] std::io::Error),
}

const HWMON_ROOT: &str = "/sys/class/hwmon";

pub fn sample() -> Result<HashMap<String, f64>, TemperatureSamplerError> {
    let root = Path::new(HWMON_ROOT);
    if !root.is_dir() {
        return Ok(HashMap::new());
    }

    let mut out = HashMap::new();
    for entry in std::fs::read_dir(root)? {
        let Ok(entry) = entry else { continue };
        let dir = entry.path();
        let device_name = std::fs::read_to_string(dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let Ok(children) = std::fs::read_dir(&dir) else {
            continue;
        };
        for child in children.flatten() {
            let file_name = child.file_name();
            let file_name = file_name.to_string_lossy();
            if !(file_name.starts_with("temp") && file_name.ends_with("_input")) {
                continue;
            }
            let prefix = file_name.trim_end_matches("_input");
            let Ok(raw) = std::fs::read_to_string(child.path()) else {
                continue;
            };
            let Ok(millidegrees) = raw.trim().parse::<i64>() else {
                continue;
            };

            let label_path = dir.join(format!("{prefix}_label"));
            let label = std::fs::read_to_string(&label_path)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| format!("{device_name}_{prefix}"));

            let celsius = millidegrees as f64 / 1000.0;
            if is_plausible(celsius) {
                out.insert(label, celsius);
            }
        }
    }

    Ok(out)
}

/// `spec.md` §4.1: "filter out implausible (`<=0`, `>120`) readings."
fn is_plausible(celsius: f64) -> bool {
    celsius > 0.0 && celsius <= 120.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_readings_are_implausible() {
        assert!(!is_plausible(0.0));
        assert!(!is_plausible(-5.0));
    }

    #[test]
    fn readings_above_120c_are_implausible() {
        assert!(!is_plausible(120.1));
        assert!(is_plausible(120.0));
    }

    #[test]
    fn ordinary_readings_pass() {
        assert!(is_plausible(42.5));
    }
}
