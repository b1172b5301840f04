//! Rolling-window telemetry collection for operator load estimation.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};

/// Look-ahead window the calendar signal is measured against, in minutes.
const CALENDAR_WINDOW_MINUTES: f64 = 60.0;

/// One observation of operator interaction over the last collection tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    /// Keystrokes counted since the previous sample.
    pub keystrokes: u32,
    pub pager_events: u32,
    pub queue_depth_observed: u32,
    /// Minutes of meetings inside the next-hour window.
    pub calendar_block_minutes: f64,
}

impl TelemetrySample {
    pub fn new(
        timestamp: DateTime<Utc>,
        keystrokes: u32,
        pager_events: u32,
        queue_depth_observed: u32,
        calendar_block_minutes: f64,
    ) -> Result<Self> {
        let sample = Self {
            timestamp,
            keystrokes,
            pager_events,
            queue_depth_observed,
            calendar_block_minutes,
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.calendar_block_minutes.is_finite() || self.calendar_block_minutes < 0.0 {
            return Err(RouterError::InvalidArgument {
                field: "calendar_block_minutes".to_string(),
                message: format!(
                    "must be finite and non-negative, got {}",
                    self.calendar_block_minutes
                ),
            });
        }
        Ok(())
    }
}

/// Aggregate derived from the samples currently inside the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Keystrokes per minute over the window.
    #[serde(default)]
    pub keystroke_rate: f64,
    /// Pager events per minute over the window.
    #[serde(default)]
    pub pager_rate: f64,
    /// Arithmetic mean of observed queue depths.
    #[serde(default)]
    pub queue_depth: f64,
    /// Mean calendar occupancy ratio, clamped to [0, 1].
    #[serde(default)]
    pub calendar_load_ratio: f64,
    #[serde(default)]
    pub sample_count: usize,
}

/// Maintains a time-bounded ordered sequence of samples.
///
/// Samples older than `window` are evicted lazily on access. Out-of-order
/// samples are accepted and inserted in timestamp order so the sequence
/// stays monotonic.
#[derive(Debug)]
pub struct TelemetryCollector {
    window: Duration,
    samples: VecDeque<TelemetrySample>,
}

impl TelemetryCollector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Append a sample, keeping the sequence ordered, then evict entries
    /// that have aged out relative to the newest timestamp.
    pub fn record(&mut self, sample: TelemetrySample) -> Result<()> {
        sample.validate()?;
        let mut insert_at = self.samples.len();
        while insert_at > 0 && self.samples[insert_at - 1].timestamp > sample.timestamp {
            insert_at -= 1;
        }
        self.samples.insert(insert_at, sample);
        if let Some(latest) = self.samples.back().map(|s| s.timestamp) {
            self.evict_before(latest - self.window);
        }
        Ok(())
    }

    /// Evict stale samples, then compute normalized rates.
    pub fn summary(&mut self, now: DateTime<Utc>) -> TelemetrySummary {
        self.evict_before(now - self.window);
        if self.samples.is_empty() {
            return TelemetrySummary::default();
        }

        let window_minutes = self.window.num_milliseconds() as f64 / 60_000.0;
        let count = self.samples.len() as f64;

        let total_keystrokes: u64 = self.samples.iter().map(|s| u64::from(s.keystrokes)).sum();
        let total_pages: u64 = self.samples.iter().map(|s| u64::from(s.pager_events)).sum();
        let depth_sum: f64 = self
            .samples
            .iter()
            .map(|s| f64::from(s.queue_depth_observed))
            .sum();
        let calendar_sum: f64 = self
            .samples
            .iter()
            .map(|s| (s.calendar_block_minutes / CALENDAR_WINDOW_MINUTES).clamp(0.0, 1.0))
            .sum();

        TelemetrySummary {
            keystroke_rate: total_keystrokes as f64 / window_minutes,
            pager_rate: total_pages as f64 / window_minutes,
            queue_depth: depth_sum / count,
            calendar_load_ratio: (calendar_sum / count).clamp(0.0, 1.0),
            sample_count: self.samples.len(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while self
            .samples
            .front()
            .map(|s| s.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.samples.pop_front();
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(Duration::minutes(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>, minutes_ago: i64, keystrokes: u32) -> TelemetrySample {
        TelemetrySample::new(now - Duration::minutes(minutes_ago), keystrokes, 0, 0, 0.0).unwrap()
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let mut collector = TelemetryCollector::default();
        let summary = collector.summary(Utc::now());
        assert_eq!(summary, TelemetrySummary::default());
        assert_eq!(summary.sample_count, 0);
    }

    #[test]
    fn test_rate_normalization() {
        let now = Utc::now();
        let mut collector = TelemetryCollector::new(Duration::minutes(30));
        collector
            .record(TelemetrySample::new(now - Duration::minutes(10), 60, 3, 2, 30.0).unwrap())
            .unwrap();
        collector
            .record(TelemetrySample::new(now, 30, 3, 4, 15.0).unwrap())
            .unwrap();

        let summary = collector.summary(now);
        assert_eq!(summary.sample_count, 2);
        // 90 keystrokes over a 30 minute window.
        assert!((summary.keystroke_rate - 3.0).abs() < 1e-9);
        assert!((summary.pager_rate - 0.2).abs() < 1e-9);
        assert!((summary.queue_depth - 3.0).abs() < 1e-9);
        // Ratios 0.5 and 0.25 against the hour window.
        assert!((summary.calendar_load_ratio - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_on_summary() {
        let now = Utc::now();
        let mut collector = TelemetryCollector::new(Duration::minutes(30));
        collector.record(sample(now, 45, 100)).unwrap();
        collector.record(sample(now, 5, 60)).unwrap();

        let summary = collector.summary(now);
        assert_eq!(summary.sample_count, 1);
        assert!((summary.keystroke_rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_on_record() {
        let now = Utc::now();
        let mut collector = TelemetryCollector::new(Duration::minutes(30));
        collector.record(sample(now, 60, 100)).unwrap();
        assert_eq!(collector.sample_count(), 1);
        // A fresh sample ages the first one out of the window.
        collector.record(sample(now, 0, 60)).unwrap();
        assert_eq!(collector.sample_count(), 1);
    }

    #[test]
    fn test_out_of_order_samples_are_ordered() {
        let now = Utc::now();
        let mut collector = TelemetryCollector::new(Duration::minutes(30));
        collector.record(sample(now, 5, 10)).unwrap();
        collector.record(sample(now, 20, 20)).unwrap();
        collector.record(sample(now, 10, 30)).unwrap();

        let timestamps: Vec<_> = collector.samples.iter().map(|s| s.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
        assert_eq!(collector.sample_count(), 3);
    }

    #[test]
    fn test_negative_calendar_minutes_rejected() {
        let err = TelemetrySample::new(Utc::now(), 0, 0, 0, -5.0).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { .. }));
    }
}
