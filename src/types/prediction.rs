//! Prediction data structures shared by the normalizer, router and presentation layer

use crate::models::registry::ModelId;
use crate::types::label::CanonicalLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Predicted class of a single inference, with the raw index kept for traceability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPrediction {
    pub label: CanonicalLabel,
    pub raw_index: usize,
}

/// Model output expressed in canonical labels only
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Model that produced the result
    pub model_id: ModelId,
    /// Probability per canonical label. Empty for label-only models.
    pub probabilities: BTreeMap<CanonicalLabel, f64>,
    /// Predicted class (arg-max for probability models)
    pub predicted: Option<ClassPrediction>,
}

impl PredictionResult {
    /// Probability for a label, if the model reported one
    pub fn probability(&self, label: CanonicalLabel) -> Option<f64> {
        self.probabilities.get(&label).copied()
    }

    /// Canonical labels with no probability in this result
    pub fn missing_labels(&self) -> Vec<CanonicalLabel> {
        CanonicalLabel::ALL
            .into_iter()
            .filter(|label| !self.probabilities.contains_key(label))
            .collect()
    }

    /// Sum of all reported probabilities
    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }

    /// Probabilities scaled to percentages (0 - 100)
    pub fn percentages(&self) -> BTreeMap<CanonicalLabel, f64> {
        self.probabilities
            .iter()
            .map(|(&label, &p)| (label, p * 100.0))
            .collect()
    }
}

/// One cell of the biomarker × group matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationCell {
    pub biomarker: String,
    pub group: CanonicalLabel,
    pub value: f64,
}

/// Denormalized view of one prediction, ordered biomarker-major
pub type PresentationMatrix = Vec<PresentationCell>;
