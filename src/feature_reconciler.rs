//! Feature reconciliation for model inference.
//!
//! Merges the sparse overrides a caller sends (slider values) with the
//! population-mean defaults of a model, producing the dense vector in the
//! exact order the model was trained on.

use crate::error::PredictError;
use crate::models::registry::{ModelId, ModelRegistry, ModelSpec};
use std::collections::HashMap;
use std::sync::Arc;

/// Caller-supplied feature values, keyed by feature name
pub type FeatureOverrides = HashMap<String, f64>;

/// Dense feature row in a model's training order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Reject overrides that are not finite real numbers
pub fn validate_overrides(overrides: &FeatureOverrides) -> Result<(), PredictError> {
    match overrides.iter().find(|(_, value)| !value.is_finite()) {
        Some((feature, value)) => Err(PredictError::InvalidFeatureValue {
            feature: feature.clone(),
            reason: format!("{} is not a finite number", value),
        }),
        None => Ok(()),
    }
}

/// Build the feature row for one model spec.
///
/// Walks the schema in order; overrides win unless the feature is locked.
/// Overrides for features outside the schema are ignored.
pub fn reconcile_spec(
    spec: &ModelSpec,
    overrides: &FeatureOverrides,
) -> Result<FeatureVector, PredictError> {
    let mut values = Vec::with_capacity(spec.feature_count());

    for name in &spec.feature_names {
        let supplied = if spec.is_locked(name) {
            None
        } else {
            overrides.get(name)
        };

        let value = match supplied.or_else(|| spec.defaults.get(name)) {
            Some(&value) => value,
            None => {
                return Err(PredictError::MissingDefault {
                    model_id: spec.model_id,
                    feature: name.clone(),
                })
            }
        };
        values.push(value);
    }

    Ok(FeatureVector(values))
}

/// Reconciler bound to the model registry
#[derive(Clone)]
pub struct FeatureReconciler {
    registry: Arc<ModelRegistry>,
}

impl FeatureReconciler {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Build the feature row of `model_id` from sparse overrides
    pub fn reconcile(
        &self,
        model_id: ModelId,
        overrides: &FeatureOverrides,
    ) -> Result<FeatureVector, PredictError> {
        let spec = self.registry.get_model_spec(model_id)?;
        reconcile_spec(spec, overrides)
    }

    /// Number of features the model consumes
    pub fn feature_count(&self, model_id: ModelId) -> Result<usize, PredictError> {
        Ok(self.registry.get_model_spec(model_id)?.feature_count())
    }

    /// Feature names in training order
    pub fn feature_names(&self, model_id: ModelId) -> Result<&[String], PredictError> {
        Ok(&self.registry.get_model_spec(model_id)?.feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reconciler() -> FeatureReconciler {
        FeatureReconciler::new(Arc::new(fixtures::registry()))
    }

    #[test]
    fn test_defaults_fill_empty_overrides() {
        let reconciler = reconciler();
        let spec_means = fixtures::linguistic_means();

        let vector = reconciler
            .reconcile(ModelId::LinguisticOnly, &FeatureOverrides::new())
            .unwrap();

        let names = reconciler.feature_names(ModelId::LinguisticOnly).unwrap();
        let expected: Vec<f64> = names.iter().map(|n| spec_means[n]).collect();
        assert_eq!(vector.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_randomized_subsets_keep_length_and_order() {
        let registry = Arc::new(fixtures::registry());
        let reconciler = FeatureReconciler::new(registry.clone());
        let mut rng = StdRng::seed_from_u64(529);

        for model_id in ModelId::ALL {
            let spec = registry.get_model_spec(model_id).unwrap();

            for _ in 0..200 {
                let mut overrides = FeatureOverrides::new();
                for name in &spec.feature_names {
                    if rng.gen_bool(0.5) {
                        overrides.insert(name.clone(), rng.gen_range(-1000.0..1000.0));
                    }
                }

                let vector = reconciler.reconcile(model_id, &overrides).unwrap();
                assert_eq!(vector.len(), spec.feature_count());

                for (position, name) in spec.feature_names.iter().enumerate() {
                    let expected = match overrides.get(name) {
                        Some(&v) if !spec.is_locked(name) => v,
                        _ => spec.defaults[name],
                    };
                    assert_eq!(vector.as_slice()[position], expected, "{} at {}", name, position);
                }
            }
        }
    }

    #[test]
    fn test_unknown_features_are_ignored() {
        let reconciler = reconciler();
        let mut overrides = FeatureOverrides::new();
        overrides.insert("VERB(participant)".to_string(), 90.0);
        overrides.insert("not_a_feature".to_string(), 1.0);
        overrides.insert("tokens(participant)".to_string(), 10.0);

        for model_id in ModelId::ALL {
            let vector = reconciler.reconcile(model_id, &overrides).unwrap();
            assert_eq!(vector.len(), reconciler.feature_count(model_id).unwrap());
        }
    }

    #[test]
    fn test_locked_features_keep_defaults() {
        let reconciler = reconciler();
        let mut overrides = FeatureOverrides::new();
        overrides.insert("P_TAU_LUMI".to_string(), 500.0);
        overrides.insert("AUX(participant)".to_string(), 12.0);

        let vector = reconciler
            .reconcile(ModelId::BiomarkerLinguistic, &overrides)
            .unwrap();
        let names = reconciler.feature_names(ModelId::BiomarkerLinguistic).unwrap();

        let p_tau = names.iter().position(|n| n == "P_TAU_LUMI").unwrap();
        let aux = names.iter().position(|n| n == "AUX(participant)").unwrap();
        assert_eq!(vector.as_slice()[p_tau], 39.25);
        assert_eq!(vector.as_slice()[aux], 12.0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let reconciler = reconciler();
        let mut overrides = FeatureOverrides::new();
        overrides.insert("TTR(participant)".to_string(), 0.5);

        let first = reconciler.reconcile(ModelId::TokenCount, &overrides).unwrap();
        let second = reconciler.reconcile(ModelId::TokenCount, &overrides).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_default_is_reported() {
        let registry = fixtures::registry();
        let mut spec = registry.get_model_spec(ModelId::LinguisticOnly).unwrap().clone();
        spec.defaults.remove("NUM(participant)");

        let err = reconcile_spec(&spec, &FeatureOverrides::new()).unwrap_err();
        assert_eq!(
            err,
            PredictError::MissingDefault {
                model_id: ModelId::LinguisticOnly,
                feature: "NUM(participant)".to_string()
            }
        );

        // An override covers the gap
        let mut overrides = FeatureOverrides::new();
        overrides.insert("NUM(participant)".to_string(), 3.0);
        assert!(reconcile_spec(&spec, &overrides).is_ok());
    }

    #[test]
    fn test_non_finite_overrides_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut overrides = FeatureOverrides::new();
            overrides.insert("TTR(participant)".to_string(), 0.4);
            overrides.insert("MATTR(participant)".to_string(), bad);

            let err = validate_overrides(&overrides).unwrap_err();
            assert!(matches!(
                err,
                PredictError::InvalidFeatureValue { ref feature, .. } if feature == "MATTR(participant)"
            ));
        }

        assert!(validate_overrides(&FeatureOverrides::new()).is_ok());
    }
}
