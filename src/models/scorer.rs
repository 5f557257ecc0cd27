//! Scorer abstraction over trained classifiers

use anyhow::{bail, Result};
use serde::Deserialize;

/// Which output a model exposes, selected per model when the registry loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Full class probability vector
    #[default]
    Probabilities,
    /// Predicted class index only
    Label,
}

/// Unprocessed classifier output. Indices are in the model's own class order.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Probabilities(Vec<f64>),
    Label(i64),
}

/// A trained classifier scoring a single row.
///
/// Implementations must be shareable across request tasks.
pub trait Scorer: Send + Sync {
    /// Capability of this scorer
    fn capability(&self) -> Capability;

    /// Input width the artifact expects, when it records one
    fn input_width(&self) -> Option<usize>;

    /// Number of classes the artifact emits, when it records one
    fn class_count(&self) -> Option<usize>;

    /// Feature names recorded at training time, in training order
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Score one feature row
    fn score(&self, row: &[f64]) -> Result<RawOutput>;
}

/// Standardization applied before the linear model
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Multinomial logistic regression evaluated in process.
///
/// Computes `softmax(W · ((x - mean) / scale) + b)`.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    scaler: Option<StandardScaler>,
    feature_names: Option<Vec<String>>,
    capability: Capability,
}

impl LogisticScorer {
    /// Build a scorer, checking that every dimension agrees.
    pub fn new(
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        scaler: Option<StandardScaler>,
        capability: Capability,
    ) -> Result<Self> {
        if coefficients.is_empty() {
            bail!("coefficient matrix is empty");
        }
        if coefficients.len() != intercepts.len() {
            bail!(
                "{} coefficient rows but {} intercepts",
                coefficients.len(),
                intercepts.len()
            );
        }

        let width = coefficients[0].len();
        if coefficients.iter().any(|row| row.len() != width) {
            bail!("coefficient rows have differing lengths");
        }
        if coefficients.iter().flatten().chain(&intercepts).any(|v| !v.is_finite()) {
            bail!("coefficients must be finite");
        }

        if let Some(scaler) = &scaler {
            if scaler.mean.len() != width || scaler.scale.len() != width {
                bail!(
                    "scaler has {} means and {} scales for {} features",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    width
                );
            }
            if scaler.scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
                bail!("scaler scales must be finite and non-zero");
            }
        }

        Ok(Self {
            coefficients,
            intercepts,
            scaler,
            feature_names: None,
            capability,
        })
    }

    /// Record the training-time feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    fn width(&self) -> usize {
        self.coefficients[0].len()
    }

    /// Class probabilities for one row
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            bail!("expected {} features, got {}", self.width(), row.len());
        }

        let scaled: Vec<f64> = match &self.scaler {
            Some(scaler) => row
                .iter()
                .zip(scaler.mean.iter().zip(&scaler.scale))
                .map(|(x, (mean, scale))| (x - mean) / scale)
                .collect(),
            None => row.to_vec(),
        };

        let logits: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, intercept)| {
                weights.iter().zip(&scaled).map(|(w, x)| w * x).sum::<f64>() + intercept
            })
            .collect();

        Ok(softmax(&logits))
    }
}

impl Scorer for LogisticScorer {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.width())
    }

    fn class_count(&self) -> Option<usize> {
        Some(self.intercepts.len())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn score(&self, row: &[f64]) -> Result<RawOutput> {
        let probabilities = self.predict_proba(row)?;
        if probabilities.iter().any(|p| !p.is_finite()) {
            bail!("non-finite probabilities for input row");
        }

        match self.capability {
            Capability::Probabilities => Ok(RawOutput::Probabilities(probabilities)),
            Capability::Label => Ok(RawOutput::Label(argmax(&probabilities) as i64)),
        }
    }
}

/// Numerically stable softmax
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}
