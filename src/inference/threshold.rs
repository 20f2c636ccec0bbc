//! Rule-based stand-in classifier.
//!
//! Scores idle/walk/run from linear-acceleration energy alone. It needs no
//! model file, so the CLI and the tests can run the whole pipeline without a
//! trained network. Output is a logit array aligned with the configured class
//! list; classes it does not recognize get a fixed low logit.

use super::{BackendLoader, InferenceBackend, InferenceError, ModelInput, RawOutput};
use crate::core::features::{TimeSeriesTensor, G_UNIT_MEDIAN_RANGE, STANDARD_GRAVITY};
use crate::core::signal;
use async_trait::async_trait;
use std::sync::Arc;

/// Linear-acceleration RMS (m/s²) below which the wearer is treated as idle.
const IDLE_CEILING: f64 = 0.5;
/// Typical walking RMS and the spread over which the walk logit stays positive.
const WALK_CENTER: f64 = 2.0;
const WALK_SPREAD: f64 = 1.75;
/// RMS above which running dominates.
const RUN_FLOOR: f64 = 4.0;
/// Logit for classes the rules know nothing about.
const UNRECOGNIZED_LOGIT: f64 = -10.0;

/// Energy-threshold classifier over a fixed class list.
#[derive(Debug, Clone)]
pub struct ThresholdBackend {
    classes: Vec<String>,
}

impl ThresholdBackend {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Get the class list the logits are emitted for.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Logits for every configured class given a linear-acceleration RMS.
    pub fn logits(&self, lin_rms: f64) -> Vec<f64> {
        let idle = 3.0 * (IDLE_CEILING - lin_rms);
        let walk = 3.0 * (1.0 - (lin_rms - WALK_CENTER).abs() / WALK_SPREAD);
        let run = 1.5 * (lin_rms - RUN_FLOOR);

        self.classes
            .iter()
            .map(|class| match class.to_ascii_uppercase().as_str() {
                "IDLE" | "STILL" | "STATIONARY" => idle,
                "WALK" | "WALKING" => walk,
                "RUN" | "RUNNING" => run,
                _ => UNRECOGNIZED_LOGIT,
            })
            .collect()
    }
}

/// Dynamic acceleration RMS from a raw tensor, in m/s².
///
/// Uses the magnitude channel's deviation from its mean. All-zero padding
/// rows are ignored.
fn tensor_dynamic_rms(tensor: &TimeSeriesTensor) -> f64 {
    let magnitudes: Vec<f64> = tensor
        .rows()
        .iter()
        .filter(|row| row.iter().any(|v| *v != 0.0))
        .map(|row| row[3])
        .collect();
    if magnitudes.is_empty() {
        return 0.0;
    }

    let mean = signal::mean(&magnitudes);
    let (lo, hi) = G_UNIT_MEDIAN_RANGE;
    let median = signal::median(&magnitudes);
    let scale = if median > lo && median < hi {
        STANDARD_GRAVITY
    } else {
        1.0
    };
    let centered: Vec<f64> = magnitudes.iter().map(|m| (m - mean) * scale).collect();
    signal::rms(&centered)
}

#[async_trait]
impl InferenceBackend for ThresholdBackend {
    fn name(&self) -> &str {
        "threshold"
    }

    async fn infer(&self, input: &ModelInput) -> Result<RawOutput, InferenceError> {
        let lin_rms = match input {
            ModelInput::Features(features) => features.get("lin_mag_rms").ok_or_else(|| {
                InferenceError::UnsupportedInput(
                    "feature order does not include lin_mag_rms".to_string(),
                )
            })?,
            ModelInput::TimeSeries(tensor) => tensor_dynamic_rms(tensor),
        };

        if !lin_rms.is_finite() {
            return Err(InferenceError::Backend(format!(
                "non-finite activity energy: {lin_rms}"
            )));
        }

        Ok(RawOutput::Scores {
            scores: self.logits(lin_rms),
        })
    }
}

/// Loader that builds a [`ThresholdBackend`], for use with
/// [`SharedBackend`](super::SharedBackend).
#[derive(Debug, Clone)]
pub struct ThresholdLoader {
    classes: Vec<String>,
}

impl ThresholdLoader {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }
}

#[async_trait]
impl BackendLoader for ThresholdLoader {
    async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
        if self.classes.is_empty() {
            return Err(InferenceError::InitFailed("no classes configured".to_string()));
        }
        Ok(Arc::new(ThresholdBackend::new(self.classes.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Sample;
    use crate::core::decision::DecisionNormalizer;
    use crate::core::features::FeatureVector;

    fn classes() -> Vec<String> {
        vec!["IDLE".to_string(), "WALK".to_string(), "RUN".to_string()]
    }

    async fn classify(rms: f64) -> String {
        let backend = ThresholdBackend::new(classes());
        let input = ModelInput::Features(FeatureVector::from_pairs([("lin_mag_rms", rms)]));
        let raw = backend.infer(&input).await.unwrap();
        DecisionNormalizer::new(classes()).normalize(&raw).label
    }

    #[tokio::test]
    async fn test_energy_bands() {
        assert_eq!(classify(0.02).await, "IDLE");
        assert_eq!(classify(1.9).await, "WALK");
        assert_eq!(classify(5.5).await, "RUN");
    }

    #[tokio::test]
    async fn test_missing_feature_is_rejected() {
        let backend = ThresholdBackend::new(classes());
        let input = ModelInput::Features(FeatureVector::from_pairs([("vert_rms", 1.0)]));
        let err = backend.infer(&input).await.unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedInput(_)));
    }

    #[tokio::test]
    async fn test_time_series_still_device_is_idle() {
        let samples: Vec<Sample> = (0..100)
            .map(|i| Sample::accel(i as f64 * 0.02, 0.0, 0.0, 1.0))
            .collect();
        let tensor = TimeSeriesTensor::from_samples(&samples, 100);
        let backend = ThresholdBackend::new(classes());
        let raw = backend.infer(&ModelInput::TimeSeries(tensor)).await.unwrap();
        let result = DecisionNormalizer::new(classes()).normalize(&raw);
        assert_eq!(result.label, "IDLE");
    }

    #[test]
    fn test_unrecognized_class_gets_low_logit() {
        let backend = ThresholdBackend::new(vec!["IDLE".to_string(), "CYCLE".to_string()]);
        assert_eq!(backend.logits(0.0)[1], UNRECOGNIZED_LOGIT);
    }

    #[tokio::test]
    async fn test_loader_rejects_empty_classes() {
        let err = ThresholdLoader::new(vec![]).load().await.err().unwrap();
        assert!(matches!(err, InferenceError::InitFailed(_)));
    }
}
