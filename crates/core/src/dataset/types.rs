//! Record types and window math.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ingested device reading, as found under the raw prefix.
///
/// Fields are loosely typed on purpose: ingestion is external and sends
/// numbers, numeric strings, or garbage. Stage 1 decides what survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Epoch seconds. Must coerce to a non-negative integer.
    pub timestamp: Value,
    /// Device identifier. Must be a non-empty string.
    pub device_id: Value,
    /// Temperature reading. Must coerce to a finite number.
    #[serde(default)]
    pub temperature: Option<Value>,
    /// Relative humidity reading. Must coerce to a finite number.
    #[serde(default)]
    pub humidity: Option<Value>,
}

/// A validated, normalized reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    /// Epoch seconds.
    pub timestamp: i64,
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Summary statistics for one measurement field within a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldSummary {
    /// Summarize a non-empty slice of values.
    pub fn of(values: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Self {
            avg: sum / values.len() as f64,
            min,
            max,
        }
    }
}

/// One fixed-window summary per (window, device) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Start of the window, epoch seconds, aligned to the window size.
    pub window_start: i64,
    pub device_id: String,
    pub temperature: FieldSummary,
    pub humidity: FieldSummary,
    /// Number of clean records contributing to this row.
    pub sample_count: u64,
}

/// A fixed-duration, non-overlapping, epoch-aligned time window.
///
/// A record at exactly `t = start` belongs to the window it starts, not the
/// prior one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Start of the window, epoch seconds.
    pub start: i64,
    /// Window duration in seconds.
    pub size_secs: u64,
}

impl Window {
    /// The window containing `timestamp`, for epoch-aligned windows of
    /// `size_secs` seconds.
    pub fn containing(timestamp: i64, size_secs: u64) -> Self {
        let size = size_secs as i64;
        let start = timestamp.div_euclid(size) * size;
        Self { start, size_secs }
    }

    /// Exclusive end of the window.
    pub fn end(&self) -> i64 {
        self.start + self.size_secs as i64
    }

    /// Whether `timestamp` falls inside this window.
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end()
    }
}
