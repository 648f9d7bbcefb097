//! Quiet hours suppression: dispatch is suppressed, but not the state
//! transition or history row, while `now` falls inside a matching window.
//! `one_time` rows are full RFC3339 instants; `daily` rows are `"HH:MM"`
//! local-time-of-day strings that may span midnight.

use crate::hub::model::{QuietHours, QuietHoursKind};
use chrono::{DateTime, Local, NaiveTime, Timelike, Utc};

/// Is `now` inside any of `rows`? `rows` should already be scoped to
/// `(user, system)` by the caller, including the system-agnostic
/// (`system = None`) template rows for that user.
pub fn is_suppressed(rows: &[QuietHours], now: DateTime<Utc>) -> bool {
    rows.iter().any(|row| matches(row, now))
}

fn matches(row: &QuietHours, now: DateTime<Utc>) -> bool {
    match row.kind {
        QuietHoursKind::OneTime => match (parse_instant(&row.start), parse_instant(&row.end)) {
            (Some(start), Some(end)) => now >= start && now <= end,
            _ => false,
        },
        QuietHoursKind::Daily => match (parse_time_of_day(&row.start), parse_time_of_day(&row.end)) {
            (Some(start), Some(end)) => time_of_day_in_window(now.with_timezone(&Local).time(), start, end),
            _ => false,
        },
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// `now` within `[start, end]` on the clock, handling the case where `end <
/// start` (the window spans midnight, e.g. `22:00`–`06:00`).
fn time_of_day_in_window(now: chrono::NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    let now = now.with_nanosecond(0).unwrap_or(now);
    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qh(kind: QuietHoursKind, start: &str, end: &str) -> QuietHours {
        QuietHours {
            id: "qh1".to_string(),
            user: "u1".to_string(),
            system: None,
            kind,
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    #[test]
    fn daily_window_spanning_midnight_matches_both_sides() {
        let row = qh(QuietHoursKind::Daily, "22:00", "06:00");
        let before_midnight = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let after_midnight = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        let daytime = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        assert!(time_of_day_in_window(before_midnight, NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap()));
        assert!(time_of_day_in_window(after_midnight, NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap()));
        assert!(!time_of_day_in_window(daytime, NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap()));
        let _ = &row;
    }

    #[test]
    fn one_time_window_is_an_inclusive_instant_range() {
        let row = qh(QuietHoursKind::OneTime, "2026-01-01T00:00:00Z", "2026-01-01T02:00:00Z");
        let inside: DateTime<Utc> = "2026-01-01T01:00:00Z".parse().unwrap();
        let outside: DateTime<Utc> = "2026-01-01T03:00:00Z".parse().unwrap();
        assert!(is_suppressed(&[row.clone()], inside));
        assert!(!is_suppressed(&[row], outside));
    }
}
