//! Recognition session counters.
//!
//! Tracks how much work the pipeline did and how often it had to degrade:
//! fallback decisions, non-finite features, low-confidence cycles. Only
//! counts are kept; no samples, features, or labels are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Samples accepted into the window buffer
    samples_processed: AtomicU64,
    /// Samples rejected for arriving out of order
    out_of_order_dropped: AtomicU64,
    /// Windows handed to feature extraction
    windows_extracted: AtomicU64,
    /// Inference cycles that produced a decision
    inferences_completed: AtomicU64,
    /// Decisions built from fallback output
    fallback_decisions: AtomicU64,
    /// Individual feature values that were NaN or infinite
    non_finite_features: AtomicU64,
    /// Decisions whose smoothed label was UNKNOWN
    unknown_decisions: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            samples_processed: AtomicU64::new(0),
            out_of_order_dropped: AtomicU64::new(0),
            windows_extracted: AtomicU64::new(0),
            inferences_completed: AtomicU64::new(0),
            fallback_decisions: AtomicU64::new(0),
            non_finite_features: AtomicU64::new(0),
            unknown_decisions: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    /// Record an accepted sample.
    pub fn record_sample(&self) {
        self.samples_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record multiple accepted samples.
    pub fn record_samples(&self, count: u64) {
        self.samples_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a sample dropped for an out-of-order timestamp.
    pub fn record_out_of_order(&self) {
        self.out_of_order_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a window handed to feature extraction.
    pub fn record_window_extracted(&self) {
        self.windows_extracted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed inference cycle.
    pub fn record_inference_completed(&self) {
        self.inferences_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decision made from fallback scores.
    pub fn record_fallback_decision(&self) {
        self.fallback_decisions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` non-finite feature values from one window.
    pub fn record_non_finite_features(&self, count: u64) {
        self.non_finite_features.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a decision smoothed to UNKNOWN.
    pub fn record_unknown_decision(&self) {
        self.unknown_decisions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            samples_processed: self.samples_processed.load(Ordering::Relaxed),
            out_of_order_dropped: self.out_of_order_dropped.load(Ordering::Relaxed),
            windows_extracted: self.windows_extracted.load(Ordering::Relaxed),
            inferences_completed: self.inferences_completed.load(Ordering::Relaxed),
            fallback_decisions: self.fallback_decisions.load(Ordering::Relaxed),
            non_finite_features: self.non_finite_features.load(Ordering::Relaxed),
            unknown_decisions: self.unknown_decisions.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Samples processed: {}\n\
             - Out-of-order samples dropped: {}\n\
             - Windows extracted: {}\n\
             - Inferences completed: {}\n\
             - Fallback decisions: {}\n\
             - Non-finite feature values: {}\n\
             - UNKNOWN decisions: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - Raw motion samples are never written by the pipeline\n\
             - Only counters are persisted",
            stats.samples_processed,
            stats.out_of_order_dropped,
            stats.windows_extracted,
            stats.inferences_completed,
            stats.fallback_decisions,
            stats.non_finite_features,
            stats.unknown_decisions,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_processed: stats.samples_processed,
                out_of_order_dropped: stats.out_of_order_dropped,
                windows_extracted: stats.windows_extracted,
                inferences_completed: stats.inferences_completed,
                fallback_decisions: stats.fallback_decisions,
                non_finite_features: stats.non_finite_features,
                unknown_decisions: stats.unknown_decisions,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_processed
                    .store(persisted.samples_processed, Ordering::Relaxed);
                self.out_of_order_dropped
                    .store(persisted.out_of_order_dropped, Ordering::Relaxed);
                self.windows_extracted
                    .store(persisted.windows_extracted, Ordering::Relaxed);
                self.inferences_completed
                    .store(persisted.inferences_completed, Ordering::Relaxed);
                self.fallback_decisions
                    .store(persisted.fallback_decisions, Ordering::Relaxed);
                self.non_finite_features
                    .store(persisted.non_finite_features, Ordering::Relaxed);
                self.unknown_decisions
                    .store(persisted.unknown_decisions, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_processed.store(0, Ordering::Relaxed);
        self.out_of_order_dropped.store(0, Ordering::Relaxed);
        self.windows_extracted.store(0, Ordering::Relaxed);
        self.inferences_completed.store(0, Ordering::Relaxed);
        self.fallback_decisions.store(0, Ordering::Relaxed);
        self.non_finite_features.store(0, Ordering::Relaxed);
        self.unknown_decisions.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub samples_processed: u64,
    pub out_of_order_dropped: u64,
    pub windows_extracted: u64,
    pub inferences_completed: u64,
    pub fallback_decisions: u64,
    pub non_finite_features: u64,
    pub unknown_decisions: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct PersistedStats {
    samples_processed: u64,
    out_of_order_dropped: u64,
    windows_extracted: u64,
    inferences_completed: u64,
    fallback_decisions: u64,
    non_finite_features: u64,
    unknown_decisions: u64,
    last_updated: DateTime<Utc>,
}

impl Default for PersistedStats {
    fn default() -> Self {
        Self {
            samples_processed: 0,
            out_of_order_dropped: 0,
            windows_extracted: 0,
            inferences_completed: 0,
            fallback_decisions: 0,
            non_finite_features: 0,
            unknown_decisions: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_sample();
        log.record_samples(9);
        log.record_window_extracted();
        log.record_fallback_decision();
        log.record_non_finite_features(3);

        let stats = log.stats();
        assert_eq!(stats.samples_processed, 10);
        assert_eq!(stats.windows_extracted, 1);
        assert_eq!(stats.fallback_decisions, 1);
        assert_eq!(stats.non_finite_features, 3);
        assert_eq!(stats.inferences_completed, 0);
    }

    #[test]
    fn test_transparency_log_reset() {
        let log = TransparencyLog::new();

        log.record_samples(100);
        log.record_unknown_decision();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.samples_processed, 0);
        assert_eq!(stats.unknown_decisions, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Samples processed"));
        assert!(summary.contains("Fallback decisions"));
        assert!(summary.contains("Privacy Guarantee"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_samples(42);
        log.record_inference_completed();
        log.save().unwrap();

        let restored = TransparencyLog::with_persistence(path);
        let stats = restored.stats();
        assert_eq!(stats.samples_processed, 42);
        assert_eq!(stats.inferences_completed, 1);
    }
}
