//! Scheduler statistics

use std::collections::VecDeque;

/// Per-tick search statistics tracker
#[derive(Debug)]
pub struct TickStats {
    /// Cycles spent per tick, most recent last
    cycles: VecDeque<usize>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Average cycles per tick over the window
    avg_cycles: f32,
    /// Peak cycles in a tick over the window
    peak_cycles: usize,
    /// Total ticks recorded
    total_ticks: u64,
    /// Searches that ended with a path
    succeeded: u64,
    /// Searches that ended without a path
    failed: u64,
    /// Planners still active after the last tick
    active: usize,
}

impl TickStats {
    /// Create a new tracker
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(120)
    }

    /// Create a tracker averaging over the last `max_samples` ticks
    #[must_use]
    pub fn with_window(max_samples: usize) -> Self {
        Self {
            cycles: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            avg_cycles: 0.0,
            peak_cycles: 0,
            total_ticks: 0,
            succeeded: 0,
            failed: 0,
            active: 0,
        }
    }

    /// Record one tick
    pub fn record_tick(&mut self, cycles: usize, succeeded: usize, failed: usize, active: usize) {
        self.total_ticks += 1;
        self.succeeded += succeeded as u64;
        self.failed += failed as u64;
        self.active = active;

        if self.cycles.len() >= self.max_samples {
            self.cycles.pop_front();
        }
        self.cycles.push_back(cycles);

        self.update_stats();
    }

    fn update_stats(&mut self) {
        if self.cycles.is_empty() {
            return;
        }

        let total: usize = self.cycles.iter().sum();
        self.avg_cycles = total as f32 / self.cycles.len() as f32;
        self.peak_cycles = self.cycles.iter().copied().max().unwrap_or(0);
    }

    /// Average cycles per tick
    #[must_use]
    pub fn avg_cycles(&self) -> f32 {
        self.avg_cycles
    }

    /// Most cycles spent in a single tick
    #[must_use]
    pub fn peak_cycles(&self) -> usize {
        self.peak_cycles
    }

    /// Total ticks recorded
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Searches that found a path
    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    /// Searches that failed
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Planners active after the last tick
    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get a formatted stats string
    #[must_use]
    pub fn format_stats(&self) -> String {
        format!(
            "Ticks: {} | Cycles: {:.1} avg, {} peak | Searches: {} ok, {} failed, {} active",
            self.total_ticks,
            self.avg_cycles,
            self.peak_cycles,
            self.succeeded,
            self.failed,
            self.active
        )
    }

    /// Forget everything
    pub fn reset(&mut self) {
        *self = Self::with_window(self.max_samples);
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_average_and_peak() {
        let mut stats = TickStats::with_window(3);
        stats.record_tick(10, 0, 0, 4);
        stats.record_tick(2, 1, 0, 3);
        stats.record_tick(3, 0, 1, 2);
        assert!((stats.avg_cycles() - 5.0).abs() < 1e-5);
        assert_eq!(stats.peak_cycles(), 10);

        // Oldest sample falls out of the window
        stats.record_tick(4, 0, 0, 2);
        assert!((stats.avg_cycles() - 3.0).abs() < 1e-5);
        assert_eq!(stats.peak_cycles(), 4);

        assert_eq!(stats.total_ticks(), 4);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.active(), 2);
    }

    #[test]
    fn test_format_and_reset() {
        let mut stats = TickStats::new();
        stats.record_tick(7, 2, 0, 0);
        assert!(stats.format_stats().contains("2 ok"));

        stats.reset();
        assert_eq!(stats.total_ticks(), 0);
        assert_eq!(stats.peak_cycles(), 0);
    }
}
