// ── Device telemetry ──

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot returned by `GET /statistics`.
///
/// Firmware builds report different counters, so the document is kept
/// as an ordered map rather than a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceStatistics(IndexMap<String, Value>);

impl DeviceStatistics {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One timestamped statistics sample.
#[derive(Debug, Clone)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub stats: Arc<DeviceStatistics>,
}

/// Rolling window of statistics samples, oldest first.
#[derive(Debug, Clone)]
pub struct StatisticsHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl StatisticsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>, stats: Arc<DeviceStatistics>) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at, stats });
    }

    /// Shrink or grow the window, dropping the oldest samples if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Numeric values of `key` across the window, skipping samples without it.
    pub fn series(&self, key: &str) -> Vec<(DateTime<Utc>, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.stats.number(key).map(|v| (s.at, v)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn stats(fps: i64) -> Arc<DeviceStatistics> {
        Arc::new(serde_json::from_value(json!({ "LED_FPS": fps, "CHIP_MODEL": "ESP32" })).unwrap())
    }

    #[test]
    fn window_drops_oldest() {
        let mut history = StatisticsHistory::new(2);
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for (i, fps) in [20, 25, 30].into_iter().enumerate() {
            history.push(t0 + chrono::Duration::seconds(i64::try_from(i).unwrap()), stats(fps));
        }
        assert_eq!(history.len(), 2);
        let fps: Vec<f64> = history.series("LED_FPS").into_iter().map(|(_, v)| v).collect();
        assert_eq!(fps, vec![25.0, 30.0]);
        assert_eq!(history.latest().unwrap().stats.number("LED_FPS"), Some(30.0));
    }

    #[test]
    fn shrinking_capacity_trims() {
        let mut history = StatisticsHistory::new(5);
        for fps in 0..5 {
            history.push(Utc::now(), stats(fps));
        }
        history.set_capacity(3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().next().unwrap().stats.number("LED_FPS"), Some(2.0));
    }

    #[test]
    fn series_skips_non_numeric() {
        let mut history = StatisticsHistory::new(4);
        history.push(Utc::now(), stats(10));
        assert!(history.series("CHIP_MODEL").is_empty());
    }
}
