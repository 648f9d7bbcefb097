//! Time-resolution tag for persisted time-series rows.

use serde::{Deserialize, Serialize};

/// A time-series resolution. Int-tagged on the wire/in storage, string
/// mapped for REST/logs (`spec.md` §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Bucket {
    OneMin = 0,
    TenMin = 1,
    TwentyMin = 2,
    OneTwentyMin = 3,
    FourEightyMin = 4,
}

impl Bucket {
    /// Resolution width in minutes.
    pub const fn minutes(self) -> i64 {
        match self {
            Bucket::OneMin => 1,
            Bucket::TenMin => 10,
            Bucket::TwentyMin => 20,
            Bucket::OneTwentyMin => 120,
            Bucket::FourEightyMin => 480,
        }
    }

    /// Retention window in minutes (`spec.md` §3 retention table).
    pub const fn retention_minutes(self) -> i64 {
        match self {
            Bucket::OneMin => 60,
            Bucket::TenMin => 12 * 60,
            Bucket::TwentyMin => 24 * 60,
            Bucket::OneTwentyMin => 7 * 24 * 60,
            Bucket::FourEightyMin => 30 * 24 * 60,
        }
    }

    /// The bucket this one rolls up into, if any (`spec.md` §4.8 cascade).
    pub const fn rollup_target(self) -> Option<Bucket> {
        match self {
            Bucket::OneMin => Some(Bucket::TenMin),
            Bucket::TenMin => Some(Bucket::TwentyMin),
            Bucket::TwentyMin => Some(Bucket::OneTwentyMin),
            Bucket::OneTwentyMin => Some(Bucket::FourEightyMin),
            Bucket::FourEightyMin => None,
        }
    }

    /// Number of source rows expected in the rollup window (`spec.md` §4.8
    /// "expected count" column).
    pub const fn expected_source_count(self) -> Option<i64> {
        match self {
            Bucket::TenMin => Some(10),
            Bucket::TwentyMin => Some(2),
            Bucket::OneTwentyMin => Some(6),
            Bucket::FourEightyMin => Some(4),
            Bucket::OneMin => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Bucket::OneMin => "1m",
            Bucket::TenMin => "10m",
            Bucket::TwentyMin => "20m",
            Bucket::OneTwentyMin => "120m",
            Bucket::FourEightyMin => "480m",
        }
    }

    pub fn from_str_tag(s: &str) -> Option<Self> {
        Some(match s {
            "1m" => Bucket::OneMin,
            "10m" => Bucket::TenMin,
            "20m" => Bucket::TwentyMin,
            "120m" => Bucket::OneTwentyMin,
            "480m" => Bucket::FourEightyMin,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_is_linear() {
        assert_eq!(Bucket::OneMin.rollup_target(), Some(Bucket::TenMin));
        assert_eq!(Bucket::TenMin.rollup_target(), Some(Bucket::TwentyMin));
        assert_eq!(Bucket::TwentyMin.rollup_target(), Some(Bucket::OneTwentyMin));
        assert_eq!(Bucket::OneTwentyMin.rollup_target(), Some(Bucket::FourEightyMin));
        assert_eq!(Bucket::FourEightyMin.rollup_target(), None);
    }

    #[test]
    fn string_tags_round_trip() {
        for b in [
            Bucket::OneMin,
            Bucket::TenMin,
            Bucket::TwentyMin,
            Bucket::OneTwentyMin,
            Bucket::FourEightyMin,
        ] {
            assert_eq!(Bucket::from_str_tag(b.as_str()), Some(b));
        }
    }
}
