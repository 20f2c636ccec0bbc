//! Core functionality for the activity recognizer.
//!
//! This module contains:
//! - Signal-processing primitives (filters, Goertzel spectra, statistics)
//! - Sliding-window buffering and hop scheduling
//! - Feature extraction from windows
//! - Normalization of raw backend output into class distributions
//! - Majority-vote smoothing
//! - The pipeline that drives a recognition session
//! - Decision reports for export

pub mod decision;
pub mod features;
pub mod pipeline;
pub mod report;
pub mod signal;
pub mod smoothing;
pub mod windowing;

// Re-export commonly used types
pub use decision::{
    ClassDistribution, DecisionNormalizer, PredictionResult, RawOutput, Resolution, UNKNOWN_LABEL,
};
pub use features::{
    compute_features, default_feature_order, FeatureConfig, FeatureExtractor, FeatureVector,
    TimeSeriesTensor, WindowFeatures, FEATURE_NAMES,
};
pub use pipeline::{
    ActivityPipeline, Decision, InputMode, PipelineConfig, PipelineTask, PredictionSource,
    NO_PREDICTION_CONFIDENCE,
};
pub use report::{ActivityReport, ReportBuilder, PRODUCER_NAME, REPORT_VERSION};
pub use smoothing::Smoother;
pub use windowing::{SchedulerConfig, SchedulerState, Window, WindowScheduler};
