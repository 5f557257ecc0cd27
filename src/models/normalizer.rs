//! Output normalization from model-specific class order to canonical labels.
//!
//! Every model was fit against its own label encoding: the biomarker model
//! used an explicit `{Normal: 0, MCI: 1, Prob AD: 2}` map while the
//! string-labelled models got the classifier's sorted class list
//! (`["MCI", "Normal", "Prob AD"]`). Raw positions are therefore never
//! reused across models; every output goes through the model's
//! [`LabelOrder`].

use crate::error::{PredictError, RegistryError};
use crate::models::registry::{ModelId, ModelSpec};
use crate::models::scorer::{argmax, RawOutput};
use crate::types::label::CanonicalLabel;
use crate::types::prediction::{ClassPrediction, PredictionResult};
use std::collections::{BTreeMap, HashMap};

/// Allowed deviation of a probability vector's sum from 1
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Meaning of each raw output index of one model.
///
/// Always a bijection between raw indices `0..3` and the canonical labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelOrder {
    raw: Vec<CanonicalLabel>,
}

impl LabelOrder {
    /// Build from the class list in raw index order (a classifier's `classes_`)
    pub fn from_classes(model_id: ModelId, classes: &[String]) -> Result<Self, RegistryError> {
        let raw = classes
            .iter()
            .map(|class| {
                class.parse::<CanonicalLabel>().map_err(|e| RegistryError::LabelOrder {
                    model_id,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_labels(model_id, raw)
    }

    /// Build from a training label map (class name → raw index)
    pub fn from_label_map(
        model_id: ModelId,
        label_map: &HashMap<String, i64>,
    ) -> Result<Self, RegistryError> {
        let mut slots: Vec<Option<CanonicalLabel>> = vec![None; label_map.len()];

        for (class, &index) in label_map {
            let label = class.parse::<CanonicalLabel>().map_err(|e| RegistryError::LabelOrder {
                model_id,
                reason: e.to_string(),
            })?;
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| slots.get_mut(i))
                .ok_or_else(|| RegistryError::LabelOrder {
                    model_id,
                    reason: format!("index {} for '{}' is outside 0..{}", index, class, label_map.len()),
                })?;
            if slot.replace(label).is_some() {
                return Err(RegistryError::LabelOrder {
                    model_id,
                    reason: format!("index {} is assigned twice", index),
                });
            }
        }

        let raw = slots.into_iter().flatten().collect();
        Self::from_labels(model_id, raw)
    }

    /// Build from canonical labels in raw index order
    pub fn from_labels(model_id: ModelId, raw: Vec<CanonicalLabel>) -> Result<Self, RegistryError> {
        if raw.len() != CanonicalLabel::ALL.len() {
            return Err(RegistryError::LabelOrder {
                model_id,
                reason: format!(
                    "expected {} classes, found {}",
                    CanonicalLabel::ALL.len(),
                    raw.len()
                ),
            });
        }

        for label in CanonicalLabel::ALL {
            let count = raw.iter().filter(|&&l| l == label).count();
            if count != 1 {
                return Err(RegistryError::LabelOrder {
                    model_id,
                    reason: format!("label {} appears {} times", label, count),
                });
            }
        }

        Ok(Self { raw })
    }

    /// Canonical label of a raw index
    pub fn canonical(&self, raw_index: i64) -> Option<CanonicalLabel> {
        usize::try_from(raw_index)
            .ok()
            .and_then(|i| self.raw.get(i))
            .copied()
    }

    /// Raw index that carries a canonical label
    pub fn raw_index_of(&self, label: CanonicalLabel) -> Option<usize> {
        self.raw.iter().position(|&l| l == label)
    }

    /// Labels in raw index order
    pub fn labels(&self) -> &[CanonicalLabel] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Map a model's raw output to canonical labels
pub fn normalize(spec: &ModelSpec, raw_output: RawOutput) -> Result<PredictionResult, PredictError> {
    let model_id = spec.model_id;
    let order = &spec.label_order;

    match raw_output {
        RawOutput::Label(raw_index) => {
            let label = order
                .canonical(raw_index)
                .ok_or(PredictError::OutOfRange { model_id, raw_index })?;

            Ok(PredictionResult {
                model_id,
                probabilities: BTreeMap::new(),
                predicted: Some(ClassPrediction {
                    label,
                    raw_index: raw_index as usize,
                }),
            })
        }
        RawOutput::Probabilities(raw) => {
            if raw.len() != order.len() {
                return Err(PredictError::ClassCountMismatch {
                    model_id,
                    expected: order.len(),
                    actual: raw.len(),
                });
            }
            check_distribution(model_id, &raw)?;

            let probabilities: BTreeMap<CanonicalLabel, f64> = order
                .labels()
                .iter()
                .copied()
                .zip(raw.iter().copied())
                .collect();

            let raw_index = argmax(&raw);
            let predicted = order.canonical(raw_index as i64).map(|label| ClassPrediction { label, raw_index });

            Ok(PredictionResult {
                model_id,
                probabilities,
                predicted,
            })
        }
    }
}

fn check_distribution(model_id: ModelId, raw: &[f64]) -> Result<(), PredictError> {
    if let Some(bad) = raw.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0) {
        return Err(PredictError::Inference {
            model_id,
            message: format!("probability {} is outside [0, 1]", bad),
        });
    }

    let total: f64 = raw.iter().sum();
    if (total - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(PredictError::Inference {
            model_id,
            message: format!("probabilities sum to {}", total),
        });
    }

    Ok(())
}
