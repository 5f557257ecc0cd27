//! Read-only catalog of the served models.
//!
//! Built once at startup and shared behind an `Arc`; nothing in here is
//! mutated after [`ModelRegistry::from_models`] returns. Every configuration
//! problem (missing default, schema drift against the artifact, broken label
//! order) is rejected here so request handling never has to guess.

use crate::config::ModelsConfig;
use crate::error::{PredictError, RegistryError};
use crate::models::loader::ModelLoader;
use crate::models::normalizer::LabelOrder;
use crate::models::scorer::{Capability, Scorer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Served model identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    /// Biomarker + linguistic model behind `predict`
    BiomarkerLinguistic,
    /// Linguistic-only classifier behind `predict_linguistic_only`
    LinguisticOnly,
    /// Token-count driven model behind `predict_from_token_count`
    TokenCount,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [
        ModelId::BiomarkerLinguistic,
        ModelId::LinguisticOnly,
        ModelId::TokenCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::BiomarkerLinguistic => "biomarker_linguistic",
            ModelId::LinguisticOnly => "linguistic_only",
            ModelId::TokenCount => "token_count",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PredictError::UnknownModel(s.to_string()))
    }
}

/// Feature schema and label contract of one model
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub model_id: ModelId,
    /// Feature names in training order
    pub feature_names: Vec<String>,
    /// Population-mean defaults
    pub defaults: HashMap<String, f64>,
    /// Meaning of each raw output index
    pub label_order: LabelOrder,
    /// Features that always take their default, whatever the caller sends
    pub locked: HashSet<String>,
    /// Biomarkers shown by the presentation matrix, in display order
    pub biomarkers: Vec<String>,
    pub capability: Capability,
}

impl ModelSpec {
    /// Build a spec, rejecting schemas that could not be reconciled
    pub fn new(
        model_id: ModelId,
        feature_names: Vec<String>,
        defaults: HashMap<String, f64>,
        label_order: LabelOrder,
        locked: Vec<String>,
        biomarkers: Vec<String>,
        capability: Capability,
    ) -> Result<Self, RegistryError> {
        let schema_error = |reason: String| RegistryError::Schema { model_id, reason };

        if feature_names.is_empty() {
            return Err(schema_error("no features declared".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &feature_names {
            if !seen.insert(name.as_str()) {
                return Err(schema_error(format!("feature '{}' is declared twice", name)));
            }
            match defaults.get(name) {
                None => {
                    return Err(RegistryError::MissingDefault {
                        model_id,
                        feature: name.clone(),
                    })
                }
                Some(value) if !value.is_finite() => {
                    return Err(schema_error(format!("default for '{}' is not finite", name)))
                }
                Some(_) => {}
            }
        }

        for name in locked.iter().chain(&biomarkers) {
            if !seen.contains(name.as_str()) {
                return Err(schema_error(format!("'{}' is not part of the feature schema", name)));
            }
        }

        Ok(Self {
            model_id,
            feature_names,
            defaults,
            label_order,
            locked: locked.into_iter().collect(),
            biomarkers,
            capability,
        })
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_locked(&self, feature: &str) -> bool {
        self.locked.contains(feature)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.feature_names.iter().any(|name| name == feature)
    }
}

/// A model's spec together with its scorer
pub struct RegisteredModel {
    pub spec: ModelSpec,
    pub scorer: Box<dyn Scorer>,
}

/// Immutable registry of every served model
pub struct ModelRegistry {
    models: HashMap<ModelId, RegisteredModel>,
    /// Schema feature fed by `predict_from_token_count`
    token_feature: String,
}

impl ModelRegistry {
    /// Load every configured model. Any failure aborts the whole load.
    pub fn load(config: &ModelsConfig) -> Result<Self, RegistryError> {
        let loader = ModelLoader::with_threads(config.onnx_threads);
        let models = loader.load_all_models(config)?;
        Self::from_models(models, &config.token_feature)
    }

    /// Assemble a registry from already-built models
    pub fn from_models(
        entries: Vec<(ModelSpec, Box<dyn Scorer>)>,
        token_feature: &str,
    ) -> Result<Self, RegistryError> {
        let mut models = HashMap::new();

        for (spec, scorer) in entries {
            check_artifact(&spec, scorer.as_ref())?;
            let model_id = spec.model_id;
            if models
                .insert(model_id, RegisteredModel { spec, scorer })
                .is_some()
            {
                return Err(RegistryError::Schema {
                    model_id,
                    reason: "model registered twice".to_string(),
                });
            }
        }

        for model_id in ModelId::ALL {
            if !models.contains_key(&model_id) {
                return Err(RegistryError::NotConfigured(model_id));
            }
        }

        let token_model = &models[&ModelId::TokenCount].spec;
        if !token_model.has_feature(token_feature) || token_model.is_locked(token_feature) {
            return Err(RegistryError::Schema {
                model_id: ModelId::TokenCount,
                reason: format!("token feature '{}' is not an overridable feature", token_feature),
            });
        }

        for model in models.values() {
            info!(
                model = %model.spec.model_id,
                features = model.spec.feature_count(),
                locked = model.spec.locked.len(),
                capability = ?model.spec.capability,
                label_order = ?model.spec.label_order.labels(),
                "Model registered"
            );
        }

        Ok(Self {
            models,
            token_feature: token_feature.to_string(),
        })
    }

    /// Spec of a model
    pub fn get_model_spec(&self, model_id: ModelId) -> Result<&ModelSpec, PredictError> {
        self.model(model_id).map(|m| &m.spec)
    }

    /// Spec and scorer of a model
    pub fn model(&self, model_id: ModelId) -> Result<&RegisteredModel, PredictError> {
        self.models
            .get(&model_id)
            .ok_or_else(|| PredictError::UnknownModel(model_id.to_string()))
    }

    pub fn token_feature(&self) -> &str {
        &self.token_feature
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// Cross-check a descriptor against what the trained artifact expects
fn check_artifact(spec: &ModelSpec, scorer: &dyn Scorer) -> Result<(), RegistryError> {
    let model_id = spec.model_id;

    if let Some(width) = scorer.input_width() {
        if width != spec.feature_count() {
            return Err(RegistryError::Schema {
                model_id,
                reason: format!(
                    "artifact expects {} inputs but the descriptor lists {} features",
                    width,
                    spec.feature_count()
                ),
            });
        }
    }

    if let Some(trained) = scorer.feature_names() {
        if let Some(absent) = spec.feature_names.iter().find(|n| !trained.contains(n)) {
            return Err(RegistryError::Schema {
                model_id,
                reason: format!("feature '{}' is absent from the trained artifact", absent),
            });
        }
        if trained != spec.feature_names.as_slice() {
            return Err(RegistryError::Schema {
                model_id,
                reason: "feature order differs from the trained artifact".to_string(),
            });
        }
    }

    if let Some(classes) = scorer.class_count() {
        if classes != spec.label_order.len() {
            return Err(RegistryError::LabelOrder {
                model_id,
                reason: format!(
                    "artifact emits {} classes but the label order has {}",
                    classes,
                    spec.label_order.len()
                ),
            });
        }
    }

    if scorer.capability() != spec.capability {
        return Err(RegistryError::Artifact {
            model_id,
            reason: format!(
                "descriptor declares {:?} but the scorer provides {:?}",
                spec.capability,
                scorer.capability()
            ),
        });
    }

    Ok(())
}
