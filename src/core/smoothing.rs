//! Majority-vote smoothing of per-cycle labels.
//!
//! Individual predictions flicker; the smoother keeps the last K accepted
//! labels and reports the most frequent one. Predictions below the
//! confidence floor are recorded as [`UNKNOWN_LABEL`] rather than dropped, so
//! a run of low-confidence cycles can itself become the majority.

use crate::core::decision::UNKNOWN_LABEL;
use std::collections::VecDeque;

/// Bounded label history with majority voting.
#[derive(Debug, Clone)]
pub struct Smoother {
    capacity: usize,
    history: VecDeque<String>,
}

impl Smoother {
    /// Create a smoother over the last `k` labels (at least one).
    pub fn new(k: usize) -> Self {
        let capacity = k.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a prediction and return the smoothed `(label, confidence)`.
    ///
    /// The returned confidence is always the caller's, even when the label
    /// was replaced by [`UNKNOWN_LABEL`] or outvoted.
    pub fn accept(&mut self, label: &str, confidence: f64, confidence_floor: f64) -> (String, f64) {
        let accepted = if confidence < confidence_floor {
            UNKNOWN_LABEL
        } else {
            label
        };

        self.history.push_back(accepted.to_string());
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        (self.majority().unwrap_or(accepted).to_string(), confidence)
    }

    /// Most frequent label in the history.
    ///
    /// Ties go to whichever tied label appears first in insertion order.
    pub fn majority(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for label in &self.history {
            let count = self.history.iter().filter(|l| *l == label).count();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label.as_str(), count)),
            }
        }
        best.map(|(label, _)| label)
    }

    /// Accepted labels, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Number of recent labels the vote considers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget all recent labels.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
