//! Small reusable cumulative-counter → rate/max tracker, shared by the disk
//! I/O and network samplers (`spec.md` §4.1: "keep previous ... counters ...
//! report rate ... and per-interval totals, and a per-subinterval maximum").

/// Tracks one monotonically increasing byte counter across two timescales:
/// a fast `tick()` (to find the per-subinterval maximum) and a slower
/// `collect()` (the reporting interval — rate and total since last collect).
#[derive(Debug, Default, Clone, Copy)]
pub struct RateCounter {
    prev_tick: Option<u64>,
    baseline: Option<u64>,
    max_tick_delta: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateSample {
    /// Bytes/sec averaged over the whole collection interval.
    pub rate: f64,
    /// Total bytes observed since the last `collect()`.
    pub total: u64,
    /// Largest single-tick delta observed since the last `collect()`.
    pub max: u64,
}

impl RateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fresh cumulative reading from a fine-grained internal tick.
    /// Updates the subinterval maximum; does not affect `collect()`'s totals.
    pub fn tick(&mut self, cumulative: u64) {
        if let Some(prev) = self.prev_tick {
            let delta = cumulative.saturating_sub(prev);
            self.max_tick_delta = self.max_tick_delta.max(delta);
        }
        self.prev_tick = Some(cumulative);
        self.baseline.get_or_insert(cumulative);
    }

    /// Close out the reporting interval: total bytes and average rate since
    /// the previous `collect()`, plus the max subinterval delta recorded via
    /// `tick()`. Resets the baseline and max for the next interval.
    pub fn collect(&mut self, cumulative: u64, elapsed_secs: f64) -> RateSample {
        let baseline = self.baseline.unwrap_or(cumulative);
        let total = cumulative.saturating_sub(baseline);
        let rate = if elapsed_secs > 0.0 {
            total as f64 / elapsed_secs
        } else {
            0.0
        };
        let max = self.max_tick_delta;

        self.baseline = Some(cumulative);
        self.max_tick_delta = 0;
        self.prev_tick = Some(cumulative);

        RateSample { rate, total, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_collect_has_zero_total() {
        let mut counter = RateCounter::new();
        let sample = counter.collect(1000, 1.0);
        assert_eq!(sample.total, 0);
    }

    #[test]
    fn rate_is_total_over_elapsed() {
        let mut counter = RateCounter::new();
        counter.collect(1000, 1.0);
        let sample = counter.collect(3000, 2.0);
        assert_eq!(sample.total, 2000);
        assert_eq!(sample.rate, 1000.0);
    }

    #[test]
    fn max_tracks_largest_tick_delta() {
        let mut counter = RateCounter::new();
        counter.collect(0, 1.0);
        counter.tick(100);
        counter.tick(150); // delta 50
        counter.tick(500); // delta 350
        let sample = counter.collect(500, 1.0);
        assert_eq!(sample.max, 350);
    }
}
