//! Inertial sample types for the Synheart Activity Agent.
//!
//! A sample is a single timestamped accelerometer reading with an optional
//! gyroscope reading. Units are not declared by producers; the feature
//! extractor resolves g versus m/s² heuristically.

use serde::{Deserialize, Serialize};

/// A single inertial measurement.
///
/// Immutable once created. Timestamps are seconds on the producer's clock and
/// only need to be monotonic within one stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample time in seconds
    pub timestamp: f64,
    /// Acceleration along x (g or m/s²)
    pub ax: f64,
    /// Acceleration along y (g or m/s²)
    pub ay: f64,
    /// Acceleration along z (g or m/s²)
    pub az: f64,
    /// Angular rate around x (rad/s), if a gyroscope is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gx: Option<f64>,
    /// Angular rate around y (rad/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gy: Option<f64>,
    /// Angular rate around z (rad/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gz: Option<f64>,
}

impl Sample {
    /// Create an accelerometer-only sample.
    pub fn accel(timestamp: f64, ax: f64, ay: f64, az: f64) -> Self {
        Self {
            timestamp,
            ax,
            ay,
            az,
            gx: None,
            gy: None,
            gz: None,
        }
    }

    /// Attach a gyroscope reading.
    pub fn with_gyro(mut self, gx: f64, gy: f64, gz: f64) -> Self {
        self.gx = Some(gx);
        self.gy = Some(gy);
        self.gz = Some(gz);
        self
    }

    /// The gyroscope reading, only when all three axes are present.
    pub fn gyro(&self) -> Option<[f64; 3]> {
        match (self.gx, self.gy, self.gz) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        }
    }

    /// Magnitude of the raw acceleration vector.
    pub fn accel_magnitude(&self) -> f64 {
        (self.ax * self.ax + self.ay * self.ay + self.az * self.az).sqrt()
    }
}

/// Units a producer may report acceleration in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelUnits {
    /// Multiples of standard gravity
    G,
    /// Metres per second squared
    MetersPerSecondSquared,
}

impl AccelUnits {
    /// Parse a unit name as accepted on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "g" => Some(Self::G),
            "ms2" | "m/s2" | "m/s^2" | "si" => Some(Self::MetersPerSecondSquared),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gyro_requires_all_axes() {
        let sample = Sample::accel(0.0, 0.0, 0.0, 9.81);
        assert!(sample.gyro().is_none());

        let sample = sample.with_gyro(0.1, 0.2, 0.3);
        assert_eq!(sample.gyro(), Some([0.1, 0.2, 0.3]));

        let partial = Sample {
            gz: None,
            ..sample
        };
        assert!(partial.gyro().is_none());
    }

    #[test]
    fn test_accel_magnitude() {
        let sample = Sample::accel(0.0, 3.0, 4.0, 0.0);
        assert!((sample.accel_magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_json_omits_missing_gyro() {
        let json = serde_json::to_string(&Sample::accel(1.5, 0.0, 0.0, 1.0)).unwrap();
        assert!(!json.contains("gx"));

        let parsed: Sample =
            serde_json::from_str(r#"{"timestamp":1.5,"ax":0,"ay":0,"az":1}"#).unwrap();
        assert_eq!(parsed.timestamp, 1.5);
        assert!(parsed.gyro().is_none());
    }

    #[test]
    fn test_units_parsing() {
        assert_eq!(AccelUnits::parse("G"), Some(AccelUnits::G));
        assert_eq!(AccelUnits::parse("m/s2"), Some(AccelUnits::MetersPerSecondSquared));
        assert_eq!(AccelUnits::parse("furlongs"), None);
    }
}
