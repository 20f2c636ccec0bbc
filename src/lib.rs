//! Synheart Activity - on-device human activity recognition.
//!
//! This library turns a stream of timestamped accelerometer (and optionally
//! gyroscope) samples into a smoothed activity label with a confidence, once
//! per hop of sample time.
//!
//! # Guarantees
//!
//! - **Bounded memory**: only `windowLength + guardInterval` of samples is kept
//! - **Deterministic scheduling**: inference is driven by sample time, so a
//!   replayed recording yields the same decisions as the live stream
//! - **Never stalls on the model**: a failing or missing backend degrades to a
//!   clearly-labeled fallback decision instead of an error
//! - **Transparency**: every fallback and non-finite feature is counted
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Synheart Activity                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │ Collector  │──▶│ Windowing  │──▶│  Features  │──▶│Inference │ │
//! │  │(synthetic/ │   │ (2 s, 1 s  │   │ (Goertzel, │   │ backend  │ │
//! │  │  replay)   │   │    hop)    │   │  vertical) │   │          │ │
//! │  └────────────┘   └────────────┘   └────────────┘   └──────────┘ │
//! │                                                          │       │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐        │       │
//! │  │Transparency│◀──│ Smoothing  │◀──│  Decision  │◀───────┘       │
//! │  │    Log     │   │ (majority) │   │ normalizer │                │
//! │  └────────────┘   └────────────┘   └────────────┘                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synheart_activity::core::{ActivityPipeline, PipelineConfig};
//! use synheart_activity::collector::Sample;
//! use synheart_activity::inference::ThresholdBackend;
//!
//! # async fn run(samples: Vec<Sample>) {
//! let config = PipelineConfig::default();
//! let backend = Arc::new(ThresholdBackend::new(config.classes.clone()));
//! let mut pipeline = ActivityPipeline::new(config, backend);
//! pipeline.on_decision(|label, confidence| println!("{label} ({confidence:.2})"));
//!
//! for sample in samples {
//!     pipeline.add_sample(sample).await;
//! }
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod inference;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorConfig, CollectorError, Sample};
pub use config::{Config, ConfigError};
pub use core::{
    compute_features, ActivityPipeline, ActivityReport, Decision, FeatureVector, PipelineConfig,
    PipelineTask, PredictionResult, ReportBuilder, WindowFeatures, NO_PREDICTION_CONFIDENCE,
    UNKNOWN_LABEL,
};
pub use inference::{InferenceBackend, InferenceError, ModelInput, RawOutput, SharedBackend};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short description of what the recognizer does and does not keep.
pub const DATA_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              SYNHEART ACTIVITY - DATA DECLARATION                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool recognizes physical activity from motion sensors.     ║
║                                                                  ║
║  ✓ WHAT IS PROCESSED:                                            ║
║    • Accelerometer readings (and gyroscope, when present)        ║
║    • Derived motion features per analysis window                 ║
║                                                                  ║
║  ✗ WHAT IS NEVER KEPT:                                           ║
║    • Samples older than the current window plus guard interval   ║
║    • Feature vectors after the window is classified              ║
║                                                                  ║
║  Only session counters are persisted. Recordings are written     ║
║  solely by the explicit `record` command.                        ║
║                                                                  ║
║  You can view session statistics anytime with:                   ║
║    synheart-activity status                                      ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_declaration_contents() {
        assert!(DATA_DECLARATION.contains("DATA DECLARATION"));
        assert!(DATA_DECLARATION.contains("NEVER KEPT"));
        assert!(DATA_DECLARATION.contains("synheart-activity status"));
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
