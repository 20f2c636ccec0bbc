//! JSON reports of recognition decisions.
//!
//! Each report describes one inference cycle: which window was classified,
//! the smoothed label, and the full class distribution behind it. Window
//! bounds are given in the sample stream's own clock; only `computed_at_utc`
//! is wall-clock time.

use crate::core::decision::{Resolution, UNKNOWN_LABEL};
use crate::core::pipeline::{Decision, PredictionSource};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "synheart-activity";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// The classified window, in sample-clock seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: f64,
    pub end: f64,
    pub sample_count: usize,
}

/// One entry of the class distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub class: String,
    pub probability: f64,
}

/// A single decision, ready for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub report_version: String,
    /// When this payload was computed (RFC3339)
    pub computed_at_utc: String,
    pub producer: ReportProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub window: ReportWindow,
    /// Smoothed label
    pub label: String,
    pub confidence: f64,
    /// Unsmoothed label of this window alone
    pub raw_label: String,
    pub distribution: Vec<ClassProbability>,
    pub source: PredictionSource,
    pub resolution: Resolution,
    pub softmax_applied: bool,
    /// True for fallback output or an UNKNOWN label
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ActivityReport {
    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builder for [`ActivityReport`]s from one producer instance.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
        }
    }

    /// Set the session ID for generated reports.
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Get the instance ID stamped on every report.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a report from a pipeline decision.
    pub fn build(&self, decision: &Decision) -> ActivityReport {
        let fallback = decision.source == PredictionSource::Fallback;
        let unknown = decision.label == UNKNOWN_LABEL;

        let notes = match (fallback, decision.prediction.resolution) {
            (true, _) => Some("Backend unavailable; uniform fallback scores".to_string()),
            (false, Resolution::Uniform) => {
                Some("Backend output unusable; uniform distribution".to_string())
            }
            _ if unknown => Some("Confidence below floor".to_string()),
            _ => None,
        };

        ActivityReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            session_id: self.session_id.clone(),
            window: ReportWindow {
                start: decision.window_start,
                end: decision.window_end,
                sample_count: decision.sample_count,
            },
            label: decision.label.clone(),
            confidence: decision.confidence,
            raw_label: decision.prediction.label.clone(),
            distribution: decision
                .prediction
                .distribution
                .iter()
                .map(|(class, probability)| ClassProbability {
                    class: class.to_string(),
                    probability,
                })
                .collect(),
            source: decision.source,
            resolution: decision.prediction.resolution,
            softmax_applied: decision.prediction.softmax_applied,
            degraded: fallback || unknown,
            notes,
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decision::DecisionNormalizer;
    use crate::inference::RawOutput;

    fn decision(raw: RawOutput, source: PredictionSource, label: &str) -> Decision {
        let classes = vec!["IDLE".to_string(), "WALK".to_string(), "RUN".to_string()];
        let prediction = DecisionNormalizer::new(classes).normalize(&raw);
        Decision {
            label: label.to_string(),
            confidence: prediction.confidence,
            prediction,
            window_start: 3.0,
            window_end: 5.0,
            sample_count: 101,
            source,
        }
    }

    #[test]
    fn test_report_from_model_decision() {
        let builder = ReportBuilder::new().with_session_id("session-1".to_string());
        let report = builder.build(&decision(
            RawOutput::Scores {
                scores: vec![0.1, 0.8, 0.1],
            },
            PredictionSource::Model,
            "WALK",
        ));

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, builder.instance_id().to_string());
        assert_eq!(report.session_id.as_deref(), Some("session-1"));
        assert_eq!(report.window.sample_count, 101);
        assert_eq!(report.label, "WALK");
        assert_eq!(report.distribution.len(), 3);
        assert_eq!(report.distribution[1].class, "WALK");
        assert!(!report.degraded);
        assert!(report.notes.is_none());
    }

    #[test]
    fn test_fallback_report_is_degraded() {
        let report = ReportBuilder::new().build(&decision(
            RawOutput::Scores {
                scores: vec![1.0 / 3.0; 3],
            },
            PredictionSource::Fallback,
            UNKNOWN_LABEL,
        ));
        assert!(report.degraded);
        assert!(report.notes.unwrap().contains("fallback"));
    }

    #[test]
    fn test_json_fields() {
        let report = ReportBuilder::new().build(&decision(
            RawOutput::Label {
                label: "run".to_string(),
            },
            PredictionSource::Model,
            "RUN",
        ));
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["label"], "RUN");
        assert_eq!(value["source"], "model");
        assert_eq!(value["resolution"], "label");
        assert!(value.get("session_id").is_none());
        assert!(value["computed_at_utc"].as_str().is_some());
    }
}
