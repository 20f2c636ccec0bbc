//! Feature computation from sample windows.
//!
//! This module turns a window of inertial samples into the named feature
//! vector a classifier consumes, or into a fixed-shape time-series tensor for
//! sequence models. Features describe the dynamics of the linear (gravity
//! removed) acceleration: its spectrum, its vertical/horizontal split, and
//! the distribution of the vertical component.

use crate::collector::types::Sample;
use crate::core::signal;
use serde::{Deserialize, Serialize};

/// Standard gravity used when rescaling g-unit streams.
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Median magnitude band that suggests a stream reports in g rather than m/s².
///
/// A heuristic: a device at rest reads ~1.0 in g and ~9.81 in m/s². It is not
/// a calibration and misfires on streams dominated by free fall or impacts.
pub const G_UNIT_MEDIAN_RANGE: (f64, f64) = (0.5, 2.0);

/// Magnitude below which a direction or denominator is treated as zero.
const EPS: f64 = 1e-9;

/// Canonical names of every feature the extractor computes, in default order.
pub const FEATURE_NAMES: [&str; 20] = [
    "lin_dom_freq_hz",
    "lin_band_energy",
    "lin_spectral_entropy",
    "lin_mag_rms",
    "jerk_mag_rms",
    "gyro_mag_rms",
    "vert_rms",
    "horiz_rms",
    "vert_horiz_ratio",
    "vert_mean",
    "vert_p05",
    "vert_p95",
    "vert_peak_ratio",
    "vert_impulse_up",
    "vert_impulse_down",
    "vert_impulse_ratio",
    "vert_jerk_rms",
    "vertical_balance",
    "impulse_balance",
    "sample_rate_hz",
];

/// Default feature order, as owned strings for configuration.
pub fn default_feature_order() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Parameters for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// EMA cutoff used to estimate gravity (Hz)
    pub gravity_cutoff_hz: f64,
    /// Lower edge of the spectral scan (Hz)
    pub fmin: f64,
    /// Upper edge of the spectral scan (Hz), clamped below Nyquist
    pub fmax: f64,
    /// Number of frequencies scanned
    pub bins: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            gravity_cutoff_hz: 0.5,
            fmin: 0.5,
            fmax: 5.0,
            bins: 20,
        }
    }
}

/// Spectral and magnitude features of the whole-body motion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionFeatures {
    /// Frequency with the most power in the scanned band
    pub dominant_freq_hz: f64,
    /// Mean band power normalized by window length
    pub band_energy: f64,
    /// Normalized spectral entropy (0 = one tone, 1 = flat)
    pub spectral_entropy: f64,
    /// RMS of linear acceleration magnitude (m/s²)
    pub lin_mag_rms: f64,
    /// RMS of jerk magnitude (m/s³)
    pub jerk_mag_rms: f64,
    /// RMS of gyroscope magnitude (rad/s), 0 without a gyroscope
    pub gyro_mag_rms: f64,
    /// Estimated sampling rate (Hz)
    pub sample_rate_hz: f64,
}

/// Features of the acceleration component along gravity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerticalFeatures {
    pub vert_rms: f64,
    pub horiz_rms: f64,
    pub vert_horiz_ratio: f64,
    pub vert_mean: f64,
    pub vert_p05: f64,
    pub vert_p95: f64,
    /// `(p95 - p05) / vert_rms`
    pub vert_peak_ratio: f64,
    /// Samples above `+vert_rms`
    pub impulse_up: u32,
    /// Samples below `-vert_rms`
    pub impulse_down: u32,
    /// Fraction of samples beyond `±vert_rms`
    pub impulse_ratio: f64,
    pub vert_jerk_rms: f64,
}

/// Derived balance scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceScores {
    /// Share of dynamics along gravity, in [0, 1]
    pub vertical_balance: f64,
    /// Upward minus downward impulses over their sum, in [-1, 1]
    pub impulse_balance: f64,
}

/// All computed features for a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub motion: MotionFeatures,
    pub vertical: VerticalFeatures,
    pub balance: BalanceScores,
    /// Whether the window was rescaled from g to m/s²
    pub rescaled_from_g: bool,
    /// Number of samples the features were computed from
    pub sample_count: usize,
}

impl WindowFeatures {
    /// Features as `(name, value)` pairs in [`FEATURE_NAMES`] order.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        let m = &self.motion;
        let v = &self.vertical;
        let b = &self.balance;
        vec![
            ("lin_dom_freq_hz", m.dominant_freq_hz),
            ("lin_band_energy", m.band_energy),
            ("lin_spectral_entropy", m.spectral_entropy),
            ("lin_mag_rms", m.lin_mag_rms),
            ("jerk_mag_rms", m.jerk_mag_rms),
            ("gyro_mag_rms", m.gyro_mag_rms),
            ("vert_rms", v.vert_rms),
            ("horiz_rms", v.horiz_rms),
            ("vert_horiz_ratio", v.vert_horiz_ratio),
            ("vert_mean", v.vert_mean),
            ("vert_p05", v.vert_p05),
            ("vert_p95", v.vert_p95),
            ("vert_peak_ratio", v.vert_peak_ratio),
            ("vert_impulse_up", v.impulse_up as f64),
            ("vert_impulse_down", v.impulse_down as f64),
            ("vert_impulse_ratio", v.impulse_ratio),
            ("vert_jerk_rms", v.vert_jerk_rms),
            ("vertical_balance", b.vertical_balance),
            ("impulse_balance", b.impulse_balance),
            ("sample_rate_hz", m.sample_rate_hz),
        ]
    }
}

/// Ordered feature vector as handed to an inference backend.
///
/// Length and order are fixed by the configured feature order; every
/// configured name has a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureVectorFields")]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct FeatureVectorFields {
    names: Vec<String>,
    values: Vec<f64>,
}

impl TryFrom<FeatureVectorFields> for FeatureVector {
    type Error = String;

    fn try_from(fields: FeatureVectorFields) -> Result<Self, Self::Error> {
        if fields.names.len() != fields.values.len() {
            return Err(format!(
                "{} feature names but {} values",
                fields.names.len(),
                fields.values.len()
            ));
        }
        Ok(Self {
            names: fields.names,
            values: fields.values,
        })
    }
}

impl FeatureVector {
    /// Lay out `features` in `order`. Unknown names default to 0.0.
    pub fn assemble(features: &WindowFeatures, order: &[String]) -> Self {
        let named = features.named();
        let values = order
            .iter()
            .map(|name| {
                named
                    .iter()
                    .find(|(n, _)| *n == name.as_str())
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0)
            })
            .collect();

        Self {
            names: order.to_vec(),
            values,
        }
    }

    /// Build a vector directly from `(name, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values) = pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self { names, values }
    }

    /// Value of a named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Get the feature names, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Get the feature values, aligned with the names.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    /// Names of features whose value is NaN or infinite.
    pub fn non_finite(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| !v.is_finite())
            .map(|(n, _)| n)
            .collect()
    }

    /// Replace non-finite values with 0.0, returning how many were replaced.
    pub fn sanitize(&mut self) -> usize {
        let mut replaced = 0;
        for v in self.values.iter_mut().filter(|v| !v.is_finite()) {
            *v = 0.0;
            replaced += 1;
        }
        replaced
    }
}

/// Number of channels per time step in a [`TimeSeriesTensor`].
pub const TIME_SERIES_CHANNELS: usize = 4;

/// Fixed-shape `[steps, 4]` tensor of `[ax, ay, az, |a|]` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTensor {
    rows: Vec<[f64; TIME_SERIES_CHANNELS]>,
}

impl TimeSeriesTensor {
    /// Reshape raw samples into `steps` rows.
    ///
    /// Keeps the first `steps` samples and zero-pads the tail when fewer are
    /// available. No filtering or unit handling is applied.
    pub fn from_samples(samples: &[Sample], steps: usize) -> Self {
        let mut rows: Vec<[f64; TIME_SERIES_CHANNELS]> = samples
            .iter()
            .take(steps)
            .map(|s| [s.ax, s.ay, s.az, s.accel_magnitude()])
            .collect();
        rows.resize(steps, [0.0; TIME_SERIES_CHANNELS]);
        Self { rows }
    }

    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.rows.len()
    }

    /// Get the `[ax, ay, az, |a|]` rows.
    pub fn rows(&self) -> &[[f64; TIME_SERIES_CHANNELS]] {
        &self.rows
    }

    /// Row-major flattened values, `steps * 4` long.
    pub fn flatten(&self) -> Vec<f64> {
        self.rows.iter().flat_map(|r| r.iter().copied()).collect()
    }
}

/// Extracts features from windows with a fixed configuration and order.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    order: Vec<String>,
}

impl FeatureExtractor {
    /// Create an extractor that lays features out in `order`.
    pub fn new(config: FeatureConfig, order: Vec<String>) -> Self {
        Self { config, order }
    }

    /// Get the extraction settings.
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Get the feature order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Compute the ordered feature vector for a window.
    pub fn extract(&self, samples: &[Sample]) -> FeatureVector {
        FeatureVector::assemble(&compute_features(samples, &self.config), &self.order)
    }
}

/// Per-axis acceleration sequences of a window.
struct Axes {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl Axes {
    fn from_samples(samples: &[Sample]) -> Self {
        Self {
            x: samples.iter().map(|s| s.ax).collect(),
            y: samples.iter().map(|s| s.ay).collect(),
            z: samples.iter().map(|s| s.az).collect(),
        }
    }

    fn scale(&mut self, factor: f64) {
        for v in self.x.iter_mut().chain(&mut self.y).chain(&mut self.z) {
            *v *= factor;
        }
    }

    fn magnitude(&self) -> Vec<f64> {
        signal::mag3(&self.x, &self.y, &self.z)
    }
}

/// Compute all features from a window of samples.
///
/// An empty window yields all-zero features.
pub fn compute_features(samples: &[Sample], config: &FeatureConfig) -> WindowFeatures {
    if samples.is_empty() {
        return WindowFeatures::default();
    }

    let timestamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
    let fs = signal::estimate_fs(&timestamps);
    let dt = 1.0 / fs;

    let mut raw = Axes::from_samples(samples);
    let rescaled_from_g = looks_like_g_units(&raw.magnitude());
    if rescaled_from_g {
        raw.scale(STANDARD_GRAVITY);
    }

    // Gravity estimate and linear acceleration.
    let gravity = Axes {
        x: signal::ema_lowpass(&raw.x, fs, config.gravity_cutoff_hz),
        y: signal::ema_lowpass(&raw.y, fs, config.gravity_cutoff_hz),
        z: signal::ema_lowpass(&raw.z, fs, config.gravity_cutoff_hz),
    };
    let lin = Axes {
        x: subtract(&raw.x, &gravity.x),
        y: subtract(&raw.y, &gravity.y),
        z: subtract(&raw.z, &gravity.z),
    };
    let lin_mag = lin.magnitude();

    let gyro_mag: Vec<f64> = samples
        .iter()
        .filter_map(Sample::gyro)
        .map(|g| (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt())
        .collect();

    let jerk = Axes {
        x: signal::derivative(&lin.x, dt),
        y: signal::derivative(&lin.y, dt),
        z: signal::derivative(&lin.z, dt),
    };
    let jerk_mag = jerk.magnitude();

    // One static direction for the whole window: orientation is assumed
    // quasi-static over a window of a few seconds.
    let up = signal::norm3(
        signal::mean(&gravity.x),
        signal::mean(&gravity.y),
        signal::mean(&gravity.z),
        EPS,
    );
    let vert = signal::project_on_axis(&lin.x, &lin.y, &lin.z, up);
    let vert_jerk = signal::project_on_axis(&jerk.x, &jerk.y, &jerk.z, up);
    let horiz = signal::horiz_from_vert(&lin.x, &lin.y, &lin.z, &vert);

    let motion = MotionFeatures {
        dominant_freq_hz: signal::dominant_freq_goertzel(
            &lin_mag,
            fs,
            config.fmin,
            config.fmax,
            config.bins,
        ),
        band_energy: signal::band_energy_goertzel(
            &lin_mag,
            fs,
            config.fmin,
            config.fmax,
            config.bins,
        ),
        spectral_entropy: signal::spectral_entropy_goertzel(
            &lin_mag,
            fs,
            config.fmin,
            config.fmax,
            config.bins,
        ),
        lin_mag_rms: signal::rms(&lin_mag),
        jerk_mag_rms: signal::rms(&jerk_mag),
        gyro_mag_rms: signal::rms(&gyro_mag),
        sample_rate_hz: fs,
    };

    let vertical = compute_vertical_features(&vert, &horiz, &vert_jerk);
    let balance = compute_balance_scores(&vertical);

    WindowFeatures {
        motion,
        vertical,
        balance,
        rescaled_from_g,
        sample_count: samples.len(),
    }
}

/// Whether the median acceleration magnitude sits where gravity lands in g.
fn looks_like_g_units(magnitude: &[f64]) -> bool {
    let m = signal::median(magnitude);
    m > G_UNIT_MEDIAN_RANGE.0 && m < G_UNIT_MEDIAN_RANGE.1
}

fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() > EPS {
        num / den
    } else {
        0.0
    }
}

/// Distribution statistics of the vertical component.
fn compute_vertical_features(vert: &[f64], horiz: &[f64], vert_jerk: &[f64]) -> VerticalFeatures {
    let vert_rms = signal::rms(vert);
    let horiz_rms = signal::rms(horiz);

    let mut sorted = vert.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let vert_p05 = signal::percentile(&sorted, 5.0);
    let vert_p95 = signal::percentile(&sorted, 95.0);

    let (impulse_up, impulse_down) = if vert_rms > EPS {
        (
            vert.iter().filter(|&&v| v > vert_rms).count() as u32,
            vert.iter().filter(|&&v| v < -vert_rms).count() as u32,
        )
    } else {
        (0, 0)
    };
    let impulse_ratio = if vert.is_empty() {
        0.0
    } else {
        (impulse_up + impulse_down) as f64 / vert.len() as f64
    };

    VerticalFeatures {
        vert_rms,
        horiz_rms,
        vert_horiz_ratio: ratio(vert_rms, horiz_rms),
        vert_mean: signal::mean(vert),
        vert_p05,
        vert_p95,
        vert_peak_ratio: ratio(vert_p95 - vert_p05, vert_rms),
        impulse_up,
        impulse_down,
        impulse_ratio,
        vert_jerk_rms: signal::rms(vert_jerk),
    }
}

fn compute_balance_scores(vertical: &VerticalFeatures) -> BalanceScores {
    let impulses = (vertical.impulse_up + vertical.impulse_down) as f64;
    BalanceScores {
        vertical_balance: ratio(vertical.vert_rms, vertical.vert_rms + vertical.horiz_rms)
            .clamp(0.0, 1.0),
        impulse_balance: ratio(
            vertical.impulse_up as f64 - vertical.impulse_down as f64,
            impulses,
        )
        .clamp(-1.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn constant_window(n: usize, az: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::accel(i as f64 * 0.02, 0.0, 0.0, az))
            .collect()
    }

    /// Gravity on z plus a vertical sinusoid.
    fn bouncing_window(n: usize, freq: f64, amp: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.02;
                Sample::accel(t, 0.0, 0.0, 9.81 + amp * (2.0 * PI * freq * t).sin())
            })
            .collect()
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let extractor = FeatureExtractor::new(FeatureConfig::default(), default_feature_order());
        let vector = extractor.extract(&[]);
        assert_eq!(vector.len(), FEATURE_NAMES.len());
        assert!(vector.values().iter().all(|&v| v == 0.0));
        assert_eq!(vector.names()[0], "lin_dom_freq_hz");
    }

    #[test]
    fn test_constant_input_has_no_dynamics() {
        let features = compute_features(&constant_window(100, 9.81), &FeatureConfig::default());
        assert!(features.vertical.vert_rms < 1e-9);
        assert!(features.vertical.horiz_rms < 1e-9);
        assert!(features.motion.jerk_mag_rms < 1e-9);
        assert_eq!(features.motion.spectral_entropy, 0.0);
        assert!(!features.rescaled_from_g);
        assert!((features.motion.sample_rate_hz - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_g_units_are_rescaled() {
        let in_g = compute_features(&constant_window(50, 1.0), &FeatureConfig::default());
        assert!(in_g.rescaled_from_g);

        let in_si = compute_features(&constant_window(50, 9.81), &FeatureConfig::default());
        assert!(!in_si.rescaled_from_g);
    }

    #[test]
    fn test_vertical_bounce_is_vertical() {
        let features = compute_features(&bouncing_window(200, 2.0, 3.0), &FeatureConfig::default());
        let v = &features.vertical;
        assert!(v.vert_rms > 1.0);
        assert!(v.horiz_rms < 0.2 * v.vert_rms);
        assert!(features.balance.vertical_balance > 0.8);
        assert!(v.vert_p95 > v.vert_p05);
        assert!(v.impulse_up > 0 && v.impulse_down > 0);
        assert!(v.impulse_ratio > 0.0 && v.impulse_ratio < 1.0);
    }

    #[test]
    fn test_dominant_frequency_of_rectified_bounce() {
        let config = FeatureConfig {
            fmin: 1.0,
            fmax: 4.0,
            bins: 7,
            ..FeatureConfig::default()
        };
        // The magnitude of a 1 Hz bounce repeats at 2 Hz.
        let features = compute_features(&bouncing_window(200, 1.0, 3.0), &config);
        assert!((features.motion.dominant_freq_hz - 2.0).abs() < 0.26);
    }

    #[test]
    fn test_gyro_rms_only_from_gyro_samples() {
        let samples: Vec<Sample> = constant_window(60, 9.81)
            .into_iter()
            .map(|s| s.with_gyro(0.0, 0.0, 0.5))
            .collect();
        let features = compute_features(&samples, &FeatureConfig::default());
        assert!((features.motion.gyro_mag_rms - 0.5).abs() < 1e-12);

        let features = compute_features(&constant_window(60, 9.81), &FeatureConfig::default());
        assert_eq!(features.motion.gyro_mag_rms, 0.0);
    }

    #[test]
    fn test_assemble_follows_order_and_defaults() {
        let features = compute_features(&bouncing_window(100, 2.0, 3.0), &FeatureConfig::default());
        let order = vec![
            "vert_rms".to_string(),
            "not_a_feature".to_string(),
            "lin_mag_rms".to_string(),
        ];
        let vector = FeatureVector::assemble(&features, &order);

        assert_eq!(vector.names(), order.as_slice());
        assert_eq!(vector.get("vert_rms"), Some(features.vertical.vert_rms));
        assert_eq!(vector.get("not_a_feature"), Some(0.0));
        assert_eq!(vector.get("missing"), None);
    }

    #[test]
    fn test_named_covers_every_feature_name() {
        let named = WindowFeatures::default().named();
        let names: Vec<&str> = named.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
    }

    #[test]
    fn test_sanitize_non_finite() {
        let order = vec!["a".to_string(), "b".to_string()];
        let mut vector = FeatureVector::assemble(&WindowFeatures::default(), &order);
        vector.values[1] = f64::NAN;

        assert_eq!(vector.non_finite(), vec!["b"]);
        assert_eq!(vector.sanitize(), 1);
        assert!(vector.non_finite().is_empty());
        assert_eq!(vector.get("b"), Some(0.0));
    }

    #[test]
    fn test_time_series_pads_and_truncates() {
        let samples = vec![Sample::accel(0.0, 3.0, 4.0, 0.0); 3];

        let padded = TimeSeriesTensor::from_samples(&samples, 5);
        assert_eq!(padded.steps(), 5);
        assert_eq!(padded.rows()[0], [3.0, 4.0, 0.0, 5.0]);
        assert_eq!(padded.rows()[4], [0.0; 4]);
        assert_eq!(padded.flatten().len(), 20);

        let truncated = TimeSeriesTensor::from_samples(&samples, 2);
        assert_eq!(truncated.steps(), 2);
        assert_eq!(truncated.rows()[1], [3.0, 4.0, 0.0, 5.0]);
    }

    #[test]
    fn test_feature_vector_rejects_mismatched_lengths() {
        let parsed: Result<FeatureVector, _> =
            serde_json::from_str(r#"{"names":["a","b"],"values":[1.0]}"#);
        assert!(parsed.is_err());

        let parsed: FeatureVector =
            serde_json::from_str(r#"{"names":["a","b"],"values":[1.0,2.0]}"#).unwrap();
        assert_eq!(parsed.get("b"), Some(2.0));
    }
}
