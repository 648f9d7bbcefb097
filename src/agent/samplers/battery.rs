//! Battery sampler (`spec.md` §4.1 "Battery").
//!
//! Reads the first `/sys/class/power_supply/BAT*` device: percentage from
//! `capacity`, state from `status`. Absent on hosts with no battery, which
//! the wire schema represents as `None`, not a zero reading.

use crate::wire::BatteryState;

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

pub fn sample() -> Option<(f64, BatteryState)> {
    let root = std::path::Path::new(POWER_SUPPLY_ROOT);
    let entries = std::fs::read_dir(root).ok()?;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("BAT") {
            continue;
        }

        let dir = entry.path();
        let capacity: f64 = std::fs::read_to_string(dir.join("capacity"))
            .ok()?
            .trim()
            .parse()
            .ok()?;
        let status = std::fs::read_to_string(dir.join("status")).unwrap_or_default();

        return Some((capacity, parse_status(status.trim())));
    }

    None
}

fn parse_status(status: &str) -> BatteryState {
    match status {
        "Charging" => BatteryState::Charging,
        "Discharging" => BatteryState::Discharging,
        "Not charging" => BatteryState::NotCharging,
        "Full" => BatteryState::Full,
        "Empty" => BatteryState::Empty,
        _ => BatteryState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_map_to_known_states() {
        assert_eq!(parse_status("Charging"), BatteryState::Charging);
        assert_eq!(parse_status("Discharging"), BatteryState::Discharging);
        assert_eq!(parse_status("Full"), BatteryState::Full);
        assert_eq!(parse_status("weird"), BatteryState::Unknown);
    }
}
