//! Configuration for the activity recognizer.
//!
//! Stored as JSON with camelCase keys. Every field has a default, so a file
//! only needs the options it changes.

use crate::core::features::{default_feature_order, FeatureConfig};
use crate::core::pipeline::{InputMode, PipelineConfig};
use crate::core::windowing::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Activity classes, in backend score order
    pub classes: Vec<String>,

    /// Feature names, in backend input order
    pub feature_order: Vec<String>,

    /// Seconds of samples analyzed per inference
    pub window_length: f64,

    /// Seconds of sample time between inferences
    pub hop: f64,

    /// Samples required inside a window
    pub min_samples: usize,

    /// Extra seconds of history kept beyond the window
    pub guard_interval: f64,

    /// Number of recent labels in the majority vote
    pub smoothing_k: usize,

    /// Predictions below this confidence become UNKNOWN
    pub confidence_floor: f64,

    /// Cutoff of the gravity low-pass filter (Hz)
    pub gravity_cutoff_hz: f64,

    /// Lower bound of the spectral scan (Hz)
    pub fmin: f64,

    /// Upper bound of the spectral scan (Hz)
    pub fmax: f64,

    /// Number of frequencies scanned
    pub bins: usize,

    pub input_mode: InputMode,

    /// Rows of the time-series tensor
    pub time_series_steps: usize,

    /// Zero NaN/infinite features before inference
    pub sanitize_non_finite: bool,

    /// Upper bound on backend initialization
    #[serde(rename = "backendInitTimeoutMs", with = "duration_serde")]
    pub backend_init_timeout: Duration,

    /// Path for transparency stats and recordings
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        let features = FeatureConfig::default();
        let pipeline = PipelineConfig::default();

        Self {
            classes: pipeline.classes,
            feature_order: default_feature_order(),
            window_length: scheduler.window_length,
            hop: scheduler.hop,
            min_samples: scheduler.min_samples,
            guard_interval: scheduler.guard_interval,
            smoothing_k: pipeline.smoothing_k,
            confidence_floor: pipeline.confidence_floor,
            gravity_cutoff_hz: features.gravity_cutoff_hz,
            fmin: features.fmin,
            fmax: features.fmax,
            bins: features.bins,
            input_mode: pipeline.input_mode,
            time_series_steps: pipeline.time_series_steps,
            sanitize_non_finite: pipeline.sanitize_non_finite,
            backend_init_timeout: Duration::from_millis(5000),
            data_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("synheart-activity"),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-activity")
            .join("config.json")
    }

    /// File holding persisted transparency counters.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("transparency_stats.json")
    }

    /// Directory for recordings written by the `record` command.
    pub fn recordings_path(&self) -> PathBuf {
        self.data_path.join("recordings")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.recordings_path())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classes.is_empty() {
            return Err(ConfigError::Invalid("classes must not be empty".into()));
        }
        if self.feature_order.is_empty() && self.input_mode == InputMode::Features {
            return Err(ConfigError::Invalid(
                "featureOrder must not be empty in features mode".into(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self
            .feature_order
            .iter()
            .find(|name| !seen.insert(name.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "duplicate feature name: {duplicate}"
            )));
        }

        if !(self.window_length.is_finite() && self.window_length > 0.0) {
            return Err(ConfigError::Invalid("windowLength must be positive".into()));
        }
        if !(self.hop.is_finite() && self.hop > 0.0) {
            return Err(ConfigError::Invalid("hop must be positive".into()));
        }
        if !(self.guard_interval.is_finite() && self.guard_interval >= 0.0) {
            return Err(ConfigError::Invalid("guardInterval must not be negative".into()));
        }
        if !(self.gravity_cutoff_hz.is_finite() && self.gravity_cutoff_hz > 0.0) {
            return Err(ConfigError::Invalid("gravityCutoffHz must be positive".into()));
        }
        if !(self.fmin.is_finite() && self.fmax.is_finite() && self.fmin < self.fmax) {
            return Err(ConfigError::Invalid(format!(
                "fmin ({}) must be below fmax ({})",
                self.fmin, self.fmax
            )));
        }
        if self.bins == 0 {
            return Err(ConfigError::Invalid("bins must be at least 1".into()));
        }
        if self.smoothing_k == 0 {
            return Err(ConfigError::Invalid("smoothingK must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ConfigError::Invalid(
                "confidenceFloor must lie in [0, 1]".into(),
            ));
        }
        if self.input_mode == InputMode::TimeSeries && self.time_series_steps == 0 {
            return Err(ConfigError::Invalid(
                "timeSeriesSteps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the window scheduler settings.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            window_length: self.window_length,
            hop: self.hop,
            min_samples: self.min_samples,
            guard_interval: self.guard_interval,
        }
    }

    /// Get the feature extraction settings.
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            gravity_cutoff_hz: self.gravity_cutoff_hz,
            fmin: self.fmin,
            fmax: self.fmax,
            bins: self.bins,
        }
    }

    /// Everything a pipeline needs from this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            classes: self.classes.clone(),
            scheduler: self.scheduler_config(),
            features: self.feature_config(),
            feature_order: self.feature_order.clone(),
            smoothing_k: self.smoothing_k,
            confidence_floor: self.confidence_floor,
            input_mode: self.input_mode,
            time_series_steps: self.time_series_steps,
            sanitize_non_finite: self.sanitize_non_finite,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.classes, vec!["IDLE", "WALK", "RUN"]);
        assert_eq!(config.window_length, 2.0);
        assert_eq!(config.hop, 1.0);
        assert_eq!(config.min_samples, 50);
        assert_eq!(config.smoothing_k, 3);
        assert_eq!(config.confidence_floor, 0.5);
        assert_eq!(config.bins, 20);
        assert_eq!(config.feature_order.len(), 20);
        assert_eq!(config.backend_init_timeout, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{ "classes": ["STILL", "MOVING"], "hop": 0.5, "inputMode": "timeSeries",
                        "backendInitTimeoutMs": 250 }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.classes, vec!["STILL", "MOVING"]);
        assert_eq!(config.hop, 0.5);
        assert_eq!(config.input_mode, InputMode::TimeSeries);
        assert_eq!(config.backend_init_timeout, Duration::from_millis(250));
        assert_eq!(config.window_length, 2.0);
        assert_eq!(config.fmax, 5.0);
    }

    #[test]
    fn test_keys_are_camel_case() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert!(value.get("featureOrder").is_some());
        assert!(value.get("gravityCutoffHz").is_some());
        assert!(value.get("smoothingK").is_some());
        assert!(value.get("backendInitTimeoutMs").is_some());
        assert_eq!(value["inputMode"], "features");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.classes.clear()),
            Box::new(|c| c.feature_order.push("lin_mag_rms".to_string())),
            Box::new(|c| c.window_length = 0.0),
            Box::new(|c| c.hop = -1.0),
            Box::new(|c| c.fmin = 6.0),
            Box::new(|c| c.bins = 0),
            Box::new(|c| c.smoothing_k = 0),
            Box::new(|c| c.confidence_floor = 1.5),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            smoothing_k: 5,
            confidence_floor: 0.7,
            data_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "bins": 0 }"#).unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_pipeline_config_mapping() {
        let config = Config {
            window_length: 4.0,
            fmax: 8.0,
            smoothing_k: 7,
            ..Config::default()
        };
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.scheduler.window_length, 4.0);
        assert_eq!(pipeline.features.fmax, 8.0);
        assert_eq!(pipeline.smoothing_k, 7);
        assert_eq!(pipeline.classes, config.classes);
    }
}
