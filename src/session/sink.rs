//! Sample sinks
//!
//! A session hands every successful sample to one [`SampleSink`]. Two sinks
//! exist:
//!
//! - [`TrendBuffer`] - bounded per-tag history for plotting
//! - [`LatestValueSink`] - the most recent sample only, for watch tables
//!
//! # Trend Window
//!
//! The trend capacity is `duration / refresh_rate` samples (floored, at least
//! one). Each push appends to the shared timestamp FIFO and to every tag's
//! FIFO, then evicts exactly one element from the front of each once the
//! length exceeds capacity. Length therefore never exceeds capacity after a
//! push returns.

use crate::config::SinkMode;
use crate::types::TagValue;
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Number of samples a trend window holds
pub fn trend_capacity(duration_ms: u64, refresh_rate_ms: u64) -> usize {
    if refresh_rate_ms == 0 {
        return 1;
    }
    ((duration_ms / refresh_rate_ms) as usize).max(1)
}

/// Build the sink for a configured mode
pub fn sink_for_mode(mode: SinkMode) -> Box<dyn SampleSink> {
    match mode {
        SinkMode::Trend => Box::new(TrendBuffer::default()),
        SinkMode::LatestOnly => Box::new(LatestValueSink::default()),
    }
}

/// Destination for successful samples
pub trait SampleSink: Send {
    /// Which retention mode this sink implements
    fn mode(&self) -> SinkMode;

    /// Discard history and prepare for a new tag set
    fn reset(&mut self, tags: &[String], capacity: usize);

    /// Append a sample; returns how many samples were evicted
    fn push(&mut self, timestamp_ms: i64, values: &[TagValue]) -> usize;

    /// Discard history and tag names
    fn clear(&mut self);

    /// Number of samples held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of samples held
    fn capacity(&self) -> usize;

    /// Most recent sample
    fn latest(&self) -> Option<(i64, Vec<TagValue>)>;

    /// Trend history, when this sink keeps one
    fn as_trend(&self) -> Option<&TrendBuffer> {
        None
    }
}

/// History of one tag
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub name: String,
    pub values: VecDeque<TagValue>,
}

/// Bounded FIFO history per tag, sharing one timestamp axis
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBuffer {
    capacity: usize,
    labels: VecDeque<i64>,
    series: Vec<TrendSeries>,
}

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new(&[], 1)
    }
}

impl TrendBuffer {
    /// Create an empty trend buffer
    pub fn new(tags: &[String], capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            labels: VecDeque::with_capacity(capacity + 1),
            series: tags
                .iter()
                .map(|name| TrendSeries {
                    name: name.clone(),
                    values: VecDeque::with_capacity(capacity + 1),
                })
                .collect(),
        }
    }

    /// Timestamp axis, oldest first
    pub fn labels(&self) -> &VecDeque<i64> {
        &self.labels
    }

    pub fn series(&self) -> &[TrendSeries] {
        &self.series
    }

    /// History of one tag by position
    pub fn series_at(&self, index: usize) -> Option<&TrendSeries> {
        self.series.get(index)
    }

    /// History of one tag by name
    pub fn series_named(&self, name: &str) -> Option<&TrendSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// `[x, y]` pairs for a tag, x in epoch milliseconds; non-numeric values are skipped
    pub fn as_plot_points(&self, index: usize) -> Vec<[f64; 2]> {
        let Some(series) = self.series.get(index) else {
            return Vec::new();
        };
        // Series and labels are trimmed together, but align from the end regardless
        let skip = self.labels.len().saturating_sub(series.values.len());
        self.labels
            .iter()
            .skip(skip)
            .zip(series.values.iter())
            .filter_map(|(ts, value)| value.as_f64().map(|y| [*ts as f64, y]))
            .collect()
    }

    /// Window snapshot as CSV: a timestamp column then one column per tag
    pub fn to_csv(&self) -> String {
        let mut out = String::from("timestamp_ms");
        for series in &self.series {
            out.push(',');
            out.push_str(&csv_field(&series.name));
        }
        out.push('\n');

        for (row, ts) in self.labels.iter().enumerate() {
            let _ = write!(out, "{}", ts);
            for series in &self.series {
                out.push(',');
                let skip = self.labels.len().saturating_sub(series.values.len());
                if let Some(value) = row.checked_sub(skip).and_then(|i| series.values.get(i)) {
                    out.push_str(&csv_field(&value.to_string()));
                }
            }
            out.push('\n');
        }
        out
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl SampleSink for TrendBuffer {
    fn mode(&self) -> SinkMode {
        SinkMode::Trend
    }

    fn reset(&mut self, tags: &[String], capacity: usize) {
        *self = TrendBuffer::new(tags, capacity);
    }

    fn push(&mut self, timestamp_ms: i64, values: &[TagValue]) -> usize {
        self.labels.push_back(timestamp_ms);
        for (i, series) in self.series.iter_mut().enumerate() {
            series
                .values
                .push_back(values.get(i).cloned().unwrap_or_default());
            if series.values.len() > self.capacity {
                series.values.pop_front();
            }
        }
        if self.labels.len() > self.capacity {
            self.labels.pop_front();
            1
        } else {
            0
        }
    }

    fn clear(&mut self) {
        self.labels.clear();
        self.series.clear();
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn latest(&self) -> Option<(i64, Vec<TagValue>)> {
        let ts = *self.labels.back()?;
        let values = self
            .series
            .iter()
            .map(|s| s.values.back().cloned().unwrap_or_default())
            .collect();
        Some((ts, values))
    }

    fn as_trend(&self) -> Option<&TrendBuffer> {
        Some(self)
    }
}

/// Keeps only the newest sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestValueSink {
    tags: Vec<String>,
    latest: Option<(i64, Vec<TagValue>)>,
}

impl LatestValueSink {
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl SampleSink for LatestValueSink {
    fn mode(&self) -> SinkMode {
        SinkMode::LatestOnly
    }

    fn reset(&mut self, tags: &[String], _capacity: usize) {
        self.tags = tags.to_vec();
        self.latest = None;
    }

    fn push(&mut self, timestamp_ms: i64, values: &[TagValue]) -> usize {
        let row = (0..self.tags.len())
            .map(|i| values.get(i).cloned().unwrap_or_default())
            .collect();
        usize::from(self.latest.replace((timestamp_ms, row)).is_some())
    }

    fn clear(&mut self) {
        self.tags.clear();
        self.latest = None;
    }

    fn len(&self) -> usize {
        usize::from(self.latest.is_some())
    }

    fn capacity(&self) -> usize {
        1
    }

    fn latest(&self) -> Option<(i64, Vec<TagValue>)> {
        self.latest.clone()
    }
}
