//! Sample sources for the Synheart Activity Agent.
//!
//! The recognition pipeline only consumes an ordered stream of [`Sample`]s.
//! This module provides the sample type plus two sources: a real-time
//! synthetic stream and JSON Lines recordings for replay.

pub mod replay;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use replay::{read_recording, write_recording, RecordingError};
pub use synthetic::{
    synthesize, synthesize_sample, ActivityProfile, CollectorConfig, CollectorError,
    SyntheticCollector,
};
pub use types::{AccelUnits, Sample};

/// Platform-agnostic collector type alias
pub type Collector = SyntheticCollector;
