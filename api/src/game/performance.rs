//! Tick timing statistics
//!
//! Rolling window of tick durations plus counters for skipped and overrun
//! ticks and the size of the last broadcast payload. Surfaced in the admin
//! state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Samples kept for the rolling average
pub const SAMPLE_WINDOW: usize = 50;

/// Tracks how long ticks take against the tick budget
#[derive(Debug)]
pub struct TickStats {
    durations: VecDeque<Duration>,
    budget: Duration,
    tick_start: Option<Instant>,
    ticks: u64,
    skipped: u64,
    overruns: u64,
    payload_bytes: usize,
}

/// Serializable view for the admin state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStatsReport {
    pub last_ms: f32,
    pub avg_ms: f32,
    pub budget_ms: f32,
    pub ticks: u64,
    pub skipped: u64,
    pub overruns: u64,
    pub payload_bytes: usize,
}

impl TickStats {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            durations: VecDeque::with_capacity(SAMPLE_WINDOW),
            budget: Duration::from_secs_f32(1.0 / tick_rate.max(1) as f32),
            tick_start: None,
            ticks: 0,
            skipped: 0,
            overruns: 0,
            payload_bytes: 0,
        }
    }

    /// Start timing a tick
    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// End timing a tick and record the duration
    pub fn tick_end(&mut self) {
        if let Some(start) = self.tick_start.take() {
            self.record_tick(start.elapsed());
        }
    }

    fn record_tick(&mut self, duration: Duration) {
        self.ticks += 1;
        if duration > self.budget {
            self.overruns += 1;
            tracing::warn!(
                took_ms = duration.as_secs_f32() * 1000.0,
                budget_ms = self.budget.as_secs_f32() * 1000.0,
                "Tick overran its budget"
            );
        }
        self.durations.push_back(duration);
        while self.durations.len() > SAMPLE_WINDOW {
            self.durations.pop_front();
        }
    }

    /// A call to advance that was too soon after the previous tick
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_payload(&mut self, bytes: usize) {
        self.payload_bytes = bytes;
    }

    pub fn last_tick_duration(&self) -> Duration {
        self.durations.back().copied().unwrap_or(Duration::ZERO)
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.durations.iter().sum();
        sum / self.durations.len() as u32
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn report(&self) -> TickStatsReport {
        TickStatsReport {
            last_ms: self.last_tick_duration().as_secs_f32() * 1000.0,
            avg_ms: self.average_tick_duration().as_secs_f32() * 1000.0,
            budget_ms: self.budget.as_secs_f32() * 1000.0,
            ticks: self.ticks,
            skipped: self.skipped,
            overruns: self.overruns,
            payload_bytes: self.payload_bytes,
        }
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new(crate::game::constants::tick::TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = TickStats::new(60);
        assert_eq!(stats.average_tick_duration(), Duration::ZERO);
        assert_eq!(stats.last_tick_duration(), Duration::ZERO);
        assert_eq!(stats.report().ticks, 0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = TickStats::new(60);
        for _ in 0..SAMPLE_WINDOW {
            stats.record_tick(Duration::from_millis(10));
        }
        for _ in 0..SAMPLE_WINDOW {
            stats.record_tick(Duration::from_millis(2));
        }
        assert_eq!(stats.durations.len(), SAMPLE_WINDOW);
        assert_eq!(stats.average_tick_duration(), Duration::from_millis(2));
        assert_eq!(stats.ticks(), 2 * SAMPLE_WINDOW as u64);
    }

    #[test]
    fn test_overruns_counted() {
        let mut stats = TickStats::new(60);
        stats.record_tick(Duration::from_millis(5));
        stats.record_tick(Duration::from_millis(40));
        let report = stats.report();
        assert_eq!(report.overruns, 1);
        assert!((report.last_ms - 40.0).abs() < 0.01);
        assert!((report.avg_ms - 22.5).abs() < 0.01);
    }

    #[test]
    fn test_tick_timing() {
        let mut stats = TickStats::new(60);
        stats.tick_start();
        std::thread::sleep(Duration::from_millis(1));
        stats.tick_end();
        assert!(stats.last_tick_duration() >= Duration::from_millis(1));
    }

    #[test]
    fn test_skip_and_payload() {
        let mut stats = TickStats::new(60);
        stats.record_skip();
        stats.record_payload(1234);
        let report = stats.report();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.payload_bytes, 1234);
    }
}
