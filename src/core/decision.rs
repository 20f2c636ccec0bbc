//! Reconciles raw inference output into a canonical class distribution.
//!
//! Backends report results in several shapes: a bare label, a score array, a
//! batch-of-one nested score array, or a label together with scores. Those
//! shapes are captured once as a [`RawOutput`] variant and resolved here;
//! nothing downstream inspects raw backend output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label reported when no class can be chosen.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Largest deviation from 1.0 at which a score array counts as normalized.
pub const NORMALIZATION_TOLERANCE: f64 = 0.01;

/// Raw backend output, one variant per accepted shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawOutput {
    /// A predicted label only
    Label { label: String },
    /// Scores aligned with the class list
    Scores { scores: Vec<f64> },
    /// Batch-of-one scores, `[[...]]`
    NestedScores { scores: Vec<Vec<f64>> },
    /// Both a predicted label and aligned scores
    LabelAndScores { label: String, scores: Vec<f64> },
}

impl RawOutput {
    /// Interpret an untyped backend result.
    ///
    /// Accepts a string, a numeric array, a nested numeric array, or an object
    /// with a `label`/`prediction`/`class` string and/or a
    /// `scores`/`probabilities`/`logits` array. Returns `None` for anything
    /// else.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(label) => Some(RawOutput::Label {
                label: label.clone(),
            }),
            Value::Array(_) => parse_scores(value),
            Value::Object(map) => {
                let label = ["label", "prediction", "class"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .map(str::to_string);
                let scores = ["scores", "probabilities", "logits"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(parse_scores));

                match (label, scores) {
                    (Some(label), Some(RawOutput::Scores { scores })) => {
                        Some(RawOutput::LabelAndScores { label, scores })
                    }
                    (Some(label), Some(RawOutput::NestedScores { scores })) => {
                        match single_row(&scores) {
                            Some(row) => Some(RawOutput::LabelAndScores {
                                label,
                                scores: row.to_vec(),
                            }),
                            None => Some(RawOutput::Label { label }),
                        }
                    }
                    (Some(label), _) => Some(RawOutput::Label { label }),
                    (None, scores) => scores,
                }
            }
            _ => None,
        }
    }
}

fn parse_scores(value: &Value) -> Option<RawOutput> {
    let items = value.as_array()?;
    if items.iter().all(Value::is_number) {
        let scores = items.iter().filter_map(Value::as_f64).collect();
        return Some(RawOutput::Scores { scores });
    }
    let rows: Option<Vec<Vec<f64>>> = items
        .iter()
        .map(|row| {
            let row = row.as_array()?;
            row.iter().map(Value::as_f64).collect()
        })
        .collect();
    rows.map(|scores| RawOutput::NestedScores { scores })
}

fn single_row(rows: &[Vec<f64>]) -> Option<&[f64]> {
    match rows {
        [row] => Some(row.as_slice()),
        _ => None,
    }
}

/// Probability per class, in class-list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DistributionFields")]
pub struct ClassDistribution {
    classes: Vec<String>,
    probabilities: Vec<f64>,
}

#[derive(Deserialize)]
struct DistributionFields {
    classes: Vec<String>,
    probabilities: Vec<f64>,
}

impl TryFrom<DistributionFields> for ClassDistribution {
    type Error = String;

    fn try_from(fields: DistributionFields) -> Result<Self, Self::Error> {
        if fields.classes.len() != fields.probabilities.len() {
            return Err(format!(
                "{} classes but {} probabilities",
                fields.classes.len(),
                fields.probabilities.len()
            ));
        }
        Ok(Self {
            classes: fields.classes,
            probabilities: fields.probabilities,
        })
    }
}

impl ClassDistribution {
    /// Equal probability for every class.
    pub fn uniform(classes: &[String]) -> Self {
        let n = classes.len();
        let p = if n == 0 { 0.0 } else { 1.0 / n as f64 };
        Self {
            classes: classes.to_vec(),
            probabilities: vec![p; n],
        }
    }

    /// All probability on the class at `index`.
    pub fn one_hot(classes: &[String], index: usize) -> Self {
        let probabilities = (0..classes.len())
            .map(|i| if i == index { 1.0 } else { 0.0 })
            .collect();
        Self {
            classes: classes.to_vec(),
            probabilities,
        }
    }

    fn from_values(classes: &[String], probabilities: Vec<f64>) -> Self {
        Self {
            classes: classes.to_vec(),
            probabilities,
        }
    }

    /// Get the class labels, in distribution order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Get the probabilities, aligned with [`classes`](Self::classes).
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Probability of a class by label.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.classes
            .iter()
            .position(|c| c == label)
            .and_then(|i| self.probabilities.get(i).copied())
    }

    /// Total probability mass.
    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Index of the largest probability; ties keep the lowest index.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            match best {
                Some((_, best_p)) if p <= best_p => {}
                _ => best = Some((i, p)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Iterate over `(label, probability)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.classes
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().copied())
    }
}

/// Which part of the raw output the distribution was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A score array aligned with the classes
    Scores,
    /// One-hot from a recognized label
    Label,
    /// Nothing usable; uniform over all classes
    Uniform,
}

/// A normalized prediction for one inference cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    /// Probability of `label`, in [0, 1]
    pub confidence: f64,
    pub distribution: ClassDistribution,
    pub resolution: Resolution,
    /// Whether the scores were treated as logits and softmaxed
    pub softmax_applied: bool,
}

/// Turns raw backend output into a [`PredictionResult`] over a fixed class list.
#[derive(Debug, Clone)]
pub struct DecisionNormalizer {
    classes: Vec<String>,
}

impl DecisionNormalizer {
    /// Create a normalizer over a fixed class list.
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Resolve an untyped backend result; unrecognized shapes become uniform.
    pub fn normalize_json(&self, value: &Value) -> PredictionResult {
        match RawOutput::from_json(value) {
            Some(raw) => self.normalize(&raw),
            None => self.finish(
                ClassDistribution::uniform(&self.classes),
                Resolution::Uniform,
                false,
            ),
        }
    }

    /// Resolve raw output into a normalized prediction.
    ///
    /// Aligned scores win over a label, a recognized label wins over the
    /// uniform fallback. Scores that are not already a probability
    /// distribution are softmaxed; an all-zero array becomes uniform.
    pub fn normalize(&self, raw: &RawOutput) -> PredictionResult {
        let (scores, label) = match raw {
            RawOutput::Label { label } => (None, Some(label.as_str())),
            RawOutput::Scores { scores } => (Some(scores.as_slice()), None),
            RawOutput::NestedScores { scores } => (single_row(scores), None),
            RawOutput::LabelAndScores { label, scores } => {
                (Some(scores.as_slice()), Some(label.as_str()))
            }
        };

        if let Some(scores) = scores.filter(|s| self.scores_usable(s)) {
            let (distribution, softmax_applied) = self.normalize_scores(scores);
            return self.finish(distribution, Resolution::Scores, softmax_applied);
        }

        if let Some(index) = label.and_then(|l| self.class_index(l)) {
            return self.finish(
                ClassDistribution::one_hot(&self.classes, index),
                Resolution::Label,
                false,
            );
        }

        tracing::debug!(?raw, "Raw output unusable, falling back to uniform");
        self.finish(ClassDistribution::uniform(&self.classes), Resolution::Uniform, false)
    }

    fn scores_usable(&self, scores: &[f64]) -> bool {
        !self.classes.is_empty()
            && scores.len() == self.classes.len()
            && scores.iter().all(|v| v.is_finite())
    }

    fn class_index(&self, label: &str) -> Option<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .or_else(|| self.classes.iter().position(|c| c.eq_ignore_ascii_case(label)))
    }

    fn normalize_scores(&self, scores: &[f64]) -> (ClassDistribution, bool) {
        let sum: f64 = scores.iter().sum();
        if sum == 0.0 {
            return (ClassDistribution::uniform(&self.classes), false);
        }

        let has_negative = scores.iter().any(|&v| v < 0.0);
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE || has_negative {
            return match softmax(scores) {
                Some(probabilities) => (
                    ClassDistribution::from_values(&self.classes, probabilities),
                    true,
                ),
                None => (ClassDistribution::uniform(&self.classes), true),
            };
        }

        (
            ClassDistribution::from_values(&self.classes, scores.to_vec()),
            false,
        )
    }

    fn finish(
        &self,
        distribution: ClassDistribution,
        resolution: Resolution,
        softmax_applied: bool,
    ) -> PredictionResult {
        let (label, confidence) = match distribution.argmax() {
            Some(i) => (self.classes[i].clone(), distribution.probabilities()[i]),
            None => (UNKNOWN_LABEL.to_string(), 0.0),
        };
        PredictionResult {
            label,
            confidence,
            distribution,
            resolution,
            softmax_applied,
        }
    }
}

/// Numerically stable softmax; `None` if the exponentials do not sum to a
/// positive finite value.
pub fn softmax(scores: &[f64]) -> Option<Vec<f64>> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    if total > 0.0 && total.is_finite() {
        Some(exps.into_iter().map(|e| e / total).collect())
    } else {
        None
    }
}
