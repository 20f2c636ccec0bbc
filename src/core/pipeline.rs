//! Recognition pipeline orchestration.
//!
//! Ties the stages together for one session:
//!
//! ```text
//! Sample ─► WindowScheduler ─► FeatureExtractor ─► InferenceBackend
//!                                                        │
//!           callback ◄── Smoother ◄── DecisionNormalizer ◄┘
//! ```
//!
//! A pipeline processes one inference cycle at a time; `add_sample` takes
//! `&mut self` and awaits the backend before returning, so cycles can never
//! overlap. To feed samples from another task use [`PipelineTask`], which
//! queues samples and drains them in order.

use crate::collector::types::Sample;
use crate::core::decision::{DecisionNormalizer, PredictionResult, UNKNOWN_LABEL};
use crate::core::features::{
    default_feature_order, FeatureConfig, FeatureExtractor, TimeSeriesTensor,
};
use crate::core::smoothing::Smoother;
use crate::core::windowing::{SchedulerConfig, Window, WindowScheduler};
use crate::inference::{InferenceBackend, ModelInput, UniformFallback};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Confidence reported by [`ActivityPipeline::latest`] before any decision.
pub const NO_PREDICTION_CONFIDENCE: f64 = -1.0;

/// What the backend is fed each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputMode {
    /// Ordered scalar feature vector
    #[default]
    Features,
    /// Raw `[steps, 4]` tensor
    TimeSeries,
}

impl InputMode {
    /// Parse a mode name (`features` or `time-series`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "features" => Some(Self::Features),
            "timeseries" => Some(Self::TimeSeries),
            _ => None,
        }
    }
}

/// Everything a pipeline needs besides its backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub classes: Vec<String>,
    pub scheduler: SchedulerConfig,
    pub features: FeatureConfig,
    pub feature_order: Vec<String>,
    pub smoothing_k: usize,
    pub confidence_floor: f64,
    pub input_mode: InputMode,
    pub time_series_steps: usize,
    /// Replace NaN/infinite feature values with 0.0 before inference
    pub sanitize_non_finite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classes: vec!["IDLE".to_string(), "WALK".to_string(), "RUN".to_string()],
            scheduler: SchedulerConfig::default(),
            features: FeatureConfig::default(),
            feature_order: default_feature_order(),
            smoothing_k: 3,
            confidence_floor: 0.5,
            input_mode: InputMode::Features,
            time_series_steps: 100,
            sanitize_non_finite: true,
        }
    }
}

/// Where a decision's scores came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// The configured backend answered
    Model,
    /// The backend failed; uniform substitute scores were used
    Fallback,
}

/// Outcome of one inference cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Smoothed label, possibly `UNKNOWN`
    pub label: String,
    /// Confidence of the latest unsmoothed prediction
    pub confidence: f64,
    /// Unsmoothed normalized prediction for this window
    pub prediction: PredictionResult,
    pub window_start: f64,
    pub window_end: f64,
    pub sample_count: usize,
    pub source: PredictionSource,
}

/// Receives `(label, confidence)` after every cycle.
pub type DecisionCallback = Box<dyn FnMut(&str, f64) + Send>;

/// One recognition session.
pub struct ActivityPipeline {
    config: PipelineConfig,
    scheduler: WindowScheduler,
    extractor: FeatureExtractor,
    normalizer: DecisionNormalizer,
    smoother: Smoother,
    backend: Arc<dyn InferenceBackend>,
    fallback: UniformFallback,
    stats: SharedTransparencyLog,
    callback: Option<DecisionCallback>,
    latest: Option<(String, f64)>,
}

impl ActivityPipeline {
    /// Create a pipeline around a (possibly shared) backend.
    pub fn new(config: PipelineConfig, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            scheduler: WindowScheduler::new(config.scheduler.clone()),
            extractor: FeatureExtractor::new(config.features.clone(), config.feature_order.clone()),
            normalizer: DecisionNormalizer::new(config.classes.clone()),
            smoother: Smoother::new(config.smoothing_k),
            fallback: UniformFallback::new(config.classes.len()),
            backend,
            stats: create_shared_log(),
            callback: None,
            latest: None,
            config,
        }
    }

    /// Report counters into an existing log instead of a private one.
    pub fn with_stats(mut self, stats: SharedTransparencyLog) -> Self {
        self.stats = stats;
        self
    }

    /// Register the per-cycle callback, replacing any previous one.
    pub fn on_decision(&mut self, callback: impl FnMut(&str, f64) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Get the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the window scheduler.
    pub fn scheduler(&self) -> &WindowScheduler {
        &self.scheduler
    }

    /// Get the transparency log this pipeline reports to.
    pub fn stats(&self) -> &SharedTransparencyLog {
        &self.stats
    }

    /// Feed one sample; runs a full inference cycle when a window is due.
    ///
    /// Returns the decision of that cycle, or `None` when no cycle ran.
    pub async fn add_sample(&mut self, sample: Sample) -> Option<Decision> {
        let dropped_before = self.scheduler.dropped_out_of_order();
        let window = self.scheduler.offer(sample);
        if self.scheduler.dropped_out_of_order() > dropped_before {
            self.stats.record_out_of_order();
            return None;
        }
        self.stats.record_sample();

        let window = window?;
        self.stats.record_window_extracted();
        Some(self.classify(&window).await)
    }

    /// Run one inference cycle over `window`.
    pub async fn classify(&mut self, window: &Window) -> Decision {
        let input = self.build_input(window);

        let (raw, source) = match self.backend.infer(&input).await {
            Ok(raw) => (raw, PredictionSource::Model),
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "Inference failed, using fallback output"
                );
                self.stats.record_fallback_decision();
                (self.fallback.output(), PredictionSource::Fallback)
            }
        };

        let prediction = self.normalizer.normalize(&raw);
        let (label, confidence) = self.smoother.accept(
            &prediction.label,
            prediction.confidence,
            self.config.confidence_floor,
        );

        self.stats.record_inference_completed();
        if label == UNKNOWN_LABEL {
            self.stats.record_unknown_decision();
        }

        debug!(
            label = %label,
            confidence,
            raw_label = %prediction.label,
            window_end = window.end(),
            ?source,
            "Inference cycle complete"
        );

        self.latest = Some((label.clone(), confidence));
        if let Some(callback) = self.callback.as_mut() {
            callback(&label, confidence);
        }

        Decision {
            label,
            confidence,
            prediction,
            window_start: window.start(),
            window_end: window.end(),
            sample_count: window.len(),
            source,
        }
    }

    /// Backend input for `window` in the configured mode.
    fn build_input(&self, window: &Window) -> ModelInput {
        match self.config.input_mode {
            InputMode::Features => {
                let mut features = self.extractor.extract(window.samples());
                let non_finite: Vec<String> =
                    features.non_finite().into_iter().map(str::to_string).collect();
                if !non_finite.is_empty() {
                    warn!(features = ?non_finite, "Non-finite feature values in window");
                    self.stats.record_non_finite_features(non_finite.len() as u64);
                    if self.config.sanitize_non_finite {
                        features.sanitize();
                    }
                }
                ModelInput::Features(features)
            }
            InputMode::TimeSeries => ModelInput::TimeSeries(TimeSeriesTensor::from_samples(
                window.samples(),
                self.config.time_series_steps,
            )),
        }
    }

    /// Latest smoothed `(label, confidence)`, or `("UNKNOWN", -1.0)` before
    /// the first cycle.
    pub fn latest(&self) -> (&str, f64) {
        match &self.latest {
            Some((label, confidence)) => (label.as_str(), *confidence),
            None => (UNKNOWN_LABEL, NO_PREDICTION_CONFIDENCE),
        }
    }

    /// End the session: drop buffered samples, smoothing history, and the
    /// latest decision. Counters are kept.
    pub fn reset(&mut self) {
        self.scheduler.clear();
        self.smoother.clear();
        self.latest = None;
    }
}

/// A pipeline running on its own task, fed through a queue.
///
/// Samples are processed strictly in the order they are sent. Decisions are
/// forwarded on the receiver returned by [`PipelineTask::spawn`].
pub struct PipelineTask {
    samples: mpsc::Sender<Sample>,
    handle: JoinHandle<ActivityPipeline>,
}

impl PipelineTask {
    /// Move `pipeline` onto a tokio task with a sample queue of `capacity`.
    pub fn spawn(
        pipeline: ActivityPipeline,
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Decision>) {
        let (sample_tx, mut sample_rx) = mpsc::channel::<Sample>(capacity.max(1));
        let (decision_tx, decision_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut pipeline = pipeline;
            while let Some(sample) = sample_rx.recv().await {
                if let Some(decision) = pipeline.add_sample(sample).await {
                    if decision_tx.send(decision).is_err() {
                        debug!("Decision receiver dropped");
                    }
                }
            }
            pipeline
        });

        (
            Self {
                samples: sample_tx,
                handle,
            },
            decision_rx,
        )
    }

    /// Queue a sample, waiting while the queue is full.
    pub async fn send(&self, sample: Sample) -> Result<(), mpsc::error::SendError<Sample>> {
        self.samples.send(sample).await
    }

    /// A cloneable handle for producers on other tasks.
    pub fn sender(&self) -> mpsc::Sender<Sample> {
        self.samples.clone()
    }

    /// Close the queue, drain what is left, and hand the pipeline back.
    ///
    /// Completes only once every other [`sender`](Self::sender) clone has
    /// been dropped too.
    pub async fn finish(self) -> Result<ActivityPipeline, tokio::task::JoinError> {
        drop(self.samples);
        self.handle.await
    }
}
