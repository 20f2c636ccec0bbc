//! Synthetic inertial sample source.
//!
//! Produces deterministic accelerometer (and optionally gyroscope) streams
//! that resemble a phone carried while idle, walking or running. Used by the
//! CLI when no hardware stream is attached and by tests that need a
//! repeatable signal.

use crate::collector::types::{AccelUnits, Sample};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Standard gravity in m/s².
const GRAVITY: f64 = 9.81;

/// Activity the synthetic source imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityProfile {
    Idle,
    Walk,
    Run,
}

impl ActivityProfile {
    /// Parse a profile name as accepted on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "idle" | "still" => Some(Self::Idle),
            "walk" | "walking" => Some(Self::Walk),
            "run" | "running" => Some(Self::Run),
            _ => None,
        }
    }

    /// Step frequency (Hz) and vertical amplitude (m/s²) of the gait.
    fn gait(self) -> (f64, f64) {
        match self {
            ActivityProfile::Idle => (0.0, 0.0),
            ActivityProfile::Walk => (1.8, 2.5),
            ActivityProfile::Run => (2.8, 7.0),
        }
    }
}

/// Configuration for the synthetic source.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub profile: ActivityProfile,
    pub rate_hz: f64,
    pub units: AccelUnits,
    pub include_gyro: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            profile: ActivityProfile::Idle,
            rate_hz: 50.0,
            units: AccelUnits::MetersPerSecondSquared,
            include_gyro: true,
        }
    }
}

/// Errors that can occur while running a collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Invalid sample rate: {0} Hz")]
    InvalidRate(f64),
}

/// Build the sample a device following `profile` would report at time `t`.
///
/// The device is held with a slight tilt so gravity is not axis-aligned. A
/// small deterministic tremor keeps idle streams from being perfectly flat.
pub fn synthesize_sample(config: &CollectorConfig, t: f64) -> Sample {
    let (step_hz, amplitude) = config.profile.gait();

    // Tilted gravity direction, unit length.
    let up = [0.0, 0.28, 0.96];

    let tremor = 0.02 * (2.0 * PI * 7.3 * t).sin() + 0.015 * (2.0 * PI * 11.9 * t + 0.4).sin();
    let bounce = amplitude * (2.0 * PI * step_hz * t).sin()
        + 0.3 * amplitude * (2.0 * PI * 2.0 * step_hz * t + 0.7).sin();
    let sway = 0.35 * amplitude * (2.0 * PI * 0.5 * step_hz * t).sin();

    let vertical = GRAVITY + bounce + tremor;
    let mut ax = sway + tremor;
    let mut ay = up[1] * vertical;
    let mut az = up[2] * vertical;

    if config.units == AccelUnits::G {
        ax /= GRAVITY;
        ay /= GRAVITY;
        az /= GRAVITY;
    }

    let sample = Sample::accel(t, ax, ay, az);
    if config.include_gyro {
        let turn = 0.4 * amplitude / 7.0;
        sample.with_gyro(
            turn * (2.0 * PI * 0.5 * step_hz * t).cos() + 0.01 * (2.0 * PI * 5.1 * t).sin(),
            0.5 * turn * (2.0 * PI * step_hz * t).sin(),
            0.01 * (2.0 * PI * 3.7 * t).cos(),
        )
    } else {
        sample
    }
}

/// Generate `duration_secs` of samples starting at `start`.
pub fn synthesize(config: &CollectorConfig, start: f64, duration_secs: f64) -> Vec<Sample> {
    if !(config.rate_hz.is_finite() && config.rate_hz > 0.0) || duration_secs <= 0.0 {
        return Vec::new();
    }
    let count = (duration_secs * config.rate_hz).round() as usize;
    (0..count)
        .map(|i| synthesize_sample(config, start + i as f64 / config.rate_hz))
        .collect()
}

/// A collector that streams synthetic samples in real time.
pub struct SyntheticCollector {
    config: CollectorConfig,
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticCollector {
    /// Create a new synthetic collector.
    pub fn new(config: CollectorConfig) -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit.
        let (sender, receiver) = bounded(10_000);
        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start streaming samples from a background thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        if !(self.config.rate_hz.is_finite() && self.config.rate_hz > 0.0) {
            return Err(CollectorError::InvalidRate(self.config.rate_hz));
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            let period = Duration::from_secs_f64(1.0 / config.rate_hz);
            let origin = Instant::now();
            let mut index: u64 = 0;

            while running.load(Ordering::SeqCst) {
                let t = index as f64 / config.rate_hz;
                if sender.try_send(synthesize_sample(&config, t)).is_err() {
                    tracing::warn!("Sample channel full or closed, dropping sample at t={t:.3}");
                }
                index += 1;

                let due = origin + period.mul_f64(index as f64);
                if let Some(wait) = due.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
        });

        self.thread_handle = Some(handle);
        tracing::info!(
            profile = ?self.config.profile,
            rate_hz = self.config.rate_hz,
            "Synthetic collector started"
        );
        Ok(())
    }

    /// Stop streaming and wait for the background thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for samples.
    pub fn receiver(&self) -> &Receiver<Sample> {
        &self.receiver
    }

    /// Try to receive a sample without blocking.
    pub fn try_recv(&self) -> Option<Sample> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for SyntheticCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
