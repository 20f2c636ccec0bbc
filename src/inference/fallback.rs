//! Substitute output used when the real backend cannot answer.

use super::{InferenceBackend, InferenceError, ModelInput, RawOutput};
use async_trait::async_trait;

/// Always reports equal scores for every class.
///
/// Decisions built from this output are tagged as fallback decisions by the
/// pipeline so they are never mistaken for model output.
#[derive(Debug, Clone)]
pub struct UniformFallback {
    class_count: usize,
}

impl UniformFallback {
    /// Create a fallback over `class_count` classes.
    pub fn new(class_count: usize) -> Self {
        Self { class_count }
    }

    /// The fallback scores, without going through the async trait.
    pub fn output(&self) -> RawOutput {
        let n = self.class_count.max(1);
        RawOutput::Scores {
            scores: vec![1.0 / n as f64; self.class_count],
        }
    }
}

#[async_trait]
impl InferenceBackend for UniformFallback {
    fn name(&self) -> &str {
        "uniform-fallback"
    }

    async fn infer(&self, _input: &ModelInput) -> Result<RawOutput, InferenceError> {
        Ok(self.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decision::{DecisionNormalizer, Resolution};

    #[test]
    fn test_fallback_normalizes_to_uniform() {
        let classes: Vec<String> = ["IDLE", "WALK", "RUN"].iter().map(|s| s.to_string()).collect();
        let fallback = UniformFallback::new(classes.len());
        let result = DecisionNormalizer::new(classes).normalize(&fallback.output());

        assert_eq!(result.resolution, Resolution::Scores);
        assert!(!result.softmax_applied);
        for p in result.distribution.probabilities() {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_class_list() {
        let fallback = UniformFallback::new(0);
        assert_eq!(fallback.output(), RawOutput::Scores { scores: vec![] });
    }
}
