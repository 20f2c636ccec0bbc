//! Inference backend seam.
//!
//! The trained model is an external collaborator. The pipeline only sees the
//! [`InferenceBackend`] trait: a feature vector or time-series tensor goes in,
//! a [`RawOutput`] comes out. Backends may be shared read-only between
//! pipelines; one-time initialization goes through [`SharedBackend`].
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use synheart_activity::inference::{SharedBackend, ThresholdLoader};
//!
//! let loader = ThresholdLoader::new(classes.clone());
//! let backend = Arc::new(SharedBackend::new(loader, Duration::from_secs(5)));
//! // Hand `backend.clone()` to as many pipelines as needed.
//! ```

mod fallback;
mod shared;
mod threshold;

use crate::core::features::{FeatureVector, TimeSeriesTensor};
use async_trait::async_trait;
use thiserror::Error;

pub use crate::core::decision::RawOutput;
pub use fallback::UniformFallback;
pub use shared::{BackendLoader, SharedBackend};
pub use threshold::{ThresholdBackend, ThresholdLoader};

/// What a backend is asked to classify.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    /// Named scalar features in configured order
    Features(FeatureVector),
    /// Fixed-shape `[steps, 4]` raw sequence
    TimeSeries(TimeSeriesTensor),
}

impl ModelInput {
    /// Short name of the input kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelInput::Features(_) => "features",
            ModelInput::TimeSeries(_) => "time_series",
        }
    }
}

/// Inference errors.
///
/// Cloneable so a single failed initialization can be handed to every caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Backend initialization failed: {0}")]
    InitFailed(String),
    #[error("Backend initialization timed out after {0} ms")]
    InitTimedOut(u64),
    #[error("Unsupported model input: {0}")]
    UnsupportedInput(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A classifier the pipeline can call once per inference cycle.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier (e.g., "threshold", "uniform-fallback")
    fn name(&self) -> &str;

    /// Classify one window.
    ///
    /// # Returns
    /// * `Ok(RawOutput)` - Output in any of the accepted shapes
    /// * `Err(_)` - Inference failed; the pipeline substitutes a fallback
    async fn infer(&self, input: &ModelInput) -> Result<RawOutput, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_input_kind() {
        let features = ModelInput::Features(FeatureVector::default());
        assert_eq!(features.kind(), "features");

        let series = ModelInput::TimeSeries(TimeSeriesTensor::from_samples(&[], 4));
        assert_eq!(series.kind(), "time_series");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            InferenceError::InitTimedOut(250).to_string(),
            "Backend initialization timed out after 250 ms"
        );
    }
}
