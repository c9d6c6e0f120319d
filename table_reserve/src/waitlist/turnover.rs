//! Rolling turnover estimate used for wait-time predictions.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Lower bound for a single turnover sample, in minutes
const MIN_SAMPLE_MINUTES: f64 = 1.0;

/// Upper bound for a single turnover sample, in minutes
const MAX_SAMPLE_MINUTES: f64 = 240.0;

/// Tracks the interval between successive seatings
#[derive(Debug, Clone)]
pub struct TurnoverTracker {
    samples: VecDeque<f64>,
    capacity: usize,
    default_minutes: u32,
    last_seating: Option<DateTime<Utc>>,
}

impl TurnoverTracker {
    pub fn new(capacity: usize, default_minutes: u32) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            default_minutes: default_minutes.max(1),
            last_seating: None,
        }
    }

    /// Record a seating. The gap since the previous seating becomes a sample.
    pub fn record_seating(&mut self, at: DateTime<Utc>) {
        if let Some(previous) = self.last_seating
            && at > previous
        {
            let minutes = (at - previous).num_seconds() as f64 / 60.0;
            self.record_minutes(minutes);
        }

        if self.last_seating.is_none_or(|previous| at > previous) {
            self.last_seating = Some(at);
        }
    }

    /// Record an explicit turnover sample, e.g. when seeding from history
    pub fn record_minutes(&mut self, minutes: f64) {
        if !minutes.is_finite() {
            return;
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples
            .push_back(minutes.clamp(MIN_SAMPLE_MINUTES, MAX_SAMPLE_MINUTES));
    }

    /// Average minutes per seating, or the default without history
    pub fn average_minutes(&self) -> f64 {
        if self.samples.is_empty() {
            f64::from(self.default_minutes)
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }

    /// Estimated wait for a 1-based queue position, rounded up to whole minutes
    pub fn estimate_wait(&self, position: u32) -> u32 {
        let minutes = (f64::from(position) * self.average_minutes()).ceil();
        minutes.min(f64::from(u32::MAX)) as u32
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_without_history() {
        let tracker = TurnoverTracker::new(20, 15);
        assert_eq!(tracker.average_minutes(), 15.0);
        assert_eq!(tracker.estimate_wait(3), 45);
    }

    #[test]
    fn test_seating_intervals_become_samples() {
        let mut tracker = TurnoverTracker::new(20, 15);
        let start = Utc::now();
        tracker.record_seating(start);
        assert_eq!(tracker.sample_count(), 0);

        tracker.record_seating(start + Duration::minutes(10));
        tracker.record_seating(start + Duration::minutes(30));
        assert_eq!(tracker.sample_count(), 2);
        assert_eq!(tracker.average_minutes(), 15.0);
    }

    #[test]
    fn test_rolling_window_drops_oldest() {
        let mut tracker = TurnoverTracker::new(2, 15);
        tracker.record_minutes(100.0);
        tracker.record_minutes(10.0);
        tracker.record_minutes(20.0);
        assert_eq!(tracker.sample_count(), 2);
        assert_eq!(tracker.average_minutes(), 15.0);
    }

    #[test]
    fn test_samples_are_clamped() {
        let mut tracker = TurnoverTracker::new(5, 15);
        tracker.record_minutes(0.0);
        tracker.record_minutes(10_000.0);
        tracker.record_minutes(f64::NAN);
        assert_eq!(tracker.sample_count(), 2);
        assert_eq!(tracker.average_minutes(), (1.0 + 240.0) / 2.0);
    }

    #[test]
    fn test_out_of_order_seating_ignored() {
        let mut tracker = TurnoverTracker::new(5, 15);
        let start = Utc::now();
        tracker.record_seating(start);
        tracker.record_seating(start - Duration::minutes(5));
        assert_eq!(tracker.sample_count(), 0);
    }

    #[test]
    fn test_estimate_rounds_up() {
        let mut tracker = TurnoverTracker::new(5, 15);
        tracker.record_minutes(7.5);
        assert_eq!(tracker.estimate_wait(1), 8);
        assert_eq!(tracker.estimate_wait(2), 15);
    }
}
