//! Sliding-window buffering and hop-based inference scheduling.
//!
//! Samples are appended to a bounded, time-ordered buffer. After every append
//! the scheduler decides, on sample time rather than wall-clock time, whether
//! a hop has elapsed since the last inference; if so it hands out a snapshot
//! of the most recent window. Driving the schedule from sample time keeps
//! replays deterministic and makes processing jitter irrelevant.

use crate::collector::types::Sample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Scheduling parameters, all times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Span of sample time analyzed per inference
    pub window_length: f64,
    /// Minimum sample-time advance between inferences
    pub hop: f64,
    /// Samples required inside the window before it is handed out
    pub min_samples: usize,
    /// Extra history retained beyond the window
    pub guard_interval: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_length: 2.0,
            hop: 1.0,
            min_samples: 50,
            guard_interval: 1.0,
        }
    }
}

/// A read-only snapshot of the samples in `[latest - window_length, latest]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    samples: Vec<Sample>,
}

impl Window {
    /// Get the samples in the window, oldest first.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the first sample, 0.0 when empty.
    pub fn start(&self) -> f64 {
        self.samples.first().map(|s| s.timestamp).unwrap_or(0.0)
    }

    /// Timestamp of the last sample, 0.0 when empty.
    pub fn end(&self) -> f64 {
        self.samples.last().map(|s| s.timestamp).unwrap_or(0.0)
    }

    /// Covered sample time in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end() - self.start()
    }
}

/// Observable scheduler state.
///
/// `Ready` is not sticky: taking a snapshot moves the scheduler straight back
/// to `Accumulating` until the next hop elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No samples buffered
    Empty,
    /// Buffering, either short of `min_samples` or inside the current hop
    Accumulating,
    /// A window is available and a hop has elapsed
    Ready,
}

/// Owns the sample buffer and decides when a window is due.
#[derive(Debug)]
pub struct WindowScheduler {
    config: SchedulerConfig,
    buffer: VecDeque<Sample>,
    last_inference: Option<f64>,
    dropped_out_of_order: u64,
}

impl WindowScheduler {
    /// Create an empty scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            buffer: VecDeque::new(),
            last_inference: None,
            dropped_out_of_order: 0,
        }
    }

    /// Get the scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Append a sample and evict everything older than the retention span.
    ///
    /// Producers must offer samples in non-decreasing timestamp order. A
    /// sample older than the latest buffered one is dropped so the buffer
    /// never needs reordering; returns `false` in that case.
    pub fn append(&mut self, sample: Sample) -> bool {
        if let Some(latest) = self.latest_timestamp() {
            if sample.timestamp < latest || !sample.timestamp.is_finite() {
                self.dropped_out_of_order += 1;
                tracing::warn!(
                    timestamp = sample.timestamp,
                    latest,
                    "Dropping out-of-order sample"
                );
                return false;
            }
        } else if !sample.timestamp.is_finite() {
            self.dropped_out_of_order += 1;
            return false;
        }

        self.buffer.push_back(sample);
        self.evict();
        true
    }

    fn evict(&mut self) {
        let Some(latest) = self.latest_timestamp() else {
            return;
        };
        let cutoff = latest - (self.config.window_length + self.config.guard_interval);
        while self
            .buffer
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.buffer.pop_front();
        }
    }

    /// Whether `sample` should start an inference cycle.
    ///
    /// Fires when no inference has happened yet or at least one hop of sample
    /// time has passed since the last one, and records `sample` as the new
    /// reference point when it does.
    pub fn maybe_trigger(&mut self, sample: &Sample) -> bool {
        let due = match self.last_inference {
            None => true,
            Some(last) => sample.timestamp - last >= self.config.hop,
        };
        if due {
            self.last_inference = Some(sample.timestamp);
        }
        due
    }

    /// The window ending at the latest buffered sample, or `None` when fewer
    /// than `min_samples` samples fall inside it.
    pub fn snapshot(&self) -> Option<Window> {
        let start = self.window_start_index()?;
        let count = self.buffer.len() - start;
        if count < self.config.min_samples.max(1) {
            return None;
        }
        Some(Window {
            samples: self.buffer.range(start..).copied().collect(),
        })
    }

    /// Append, gate on the hop, and snapshot in one step.
    pub fn offer(&mut self, sample: Sample) -> Option<Window> {
        if !self.append(sample) {
            return None;
        }
        if !self.maybe_trigger(&sample) {
            return None;
        }
        let window = self.snapshot();
        if window.is_none() {
            tracing::debug!(
                timestamp = sample.timestamp,
                buffered = self.buffer.len(),
                "Hop elapsed but window not ready"
            );
        }
        window
    }

    fn window_start_index(&self) -> Option<usize> {
        let latest = self.latest_timestamp()?;
        let from = latest - self.config.window_length;
        Some(self.buffer.partition_point(|s| s.timestamp < from))
    }

    /// Number of buffered samples inside the current window.
    pub fn window_sample_count(&self) -> usize {
        self.window_start_index()
            .map(|start| self.buffer.len() - start)
            .unwrap_or(0)
    }

    /// Current position in the `Empty → Accumulating → Ready` cycle.
    pub fn state(&self) -> SchedulerState {
        let Some(latest) = self.latest_timestamp() else {
            return SchedulerState::Empty;
        };
        let hop_elapsed = self
            .last_inference
            .map_or(true, |last| latest - last >= self.config.hop);
        if hop_elapsed && self.window_sample_count() >= self.config.min_samples.max(1) {
            SchedulerState::Ready
        } else {
            SchedulerState::Accumulating
        }
    }

    /// Drop all buffered samples and scheduling history.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_inference = None;
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Timestamp of the newest buffered sample.
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.buffer.back().map(|s| s.timestamp)
    }

    /// Timestamp of the oldest buffered sample.
    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.buffer.front().map(|s| s.timestamp)
    }

    /// Sample time of the last hop trigger, if any.
    pub fn last_inference(&self) -> Option<f64> {
        self.last_inference
    }

    /// Samples rejected for arriving out of order.
    pub fn dropped_out_of_order(&self) -> u64 {
        self.dropped_out_of_order
    }
}
