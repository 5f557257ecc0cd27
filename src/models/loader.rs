//! Model descriptor and artifact loader

use crate::config::ModelsConfig;
use crate::error::RegistryError;
use crate::models::normalizer::LabelOrder;
use crate::models::onnx::OnnxScorer;
use crate::models::registry::{ModelId, ModelSpec};
use crate::models::scorer::{Capability, LogisticScorer, Scorer, StandardScaler};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Metadata written by the training pipeline next to each artifact
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    pub model_id: ModelId,
    /// Full schema in training order. When absent the schema is
    /// `biomarkers ++ linguistic`.
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub biomarkers: Vec<String>,
    #[serde(default)]
    pub linguistic: Vec<String>,
    pub feature_means: HashMap<String, f64>,
    /// Class names in raw output order
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    /// Class name → raw output index
    #[serde(default)]
    pub label_map: Option<HashMap<String, i64>>,
    #[serde(default)]
    pub locked_features: Option<Vec<String>>,
    #[serde(default)]
    pub capability: Capability,
    pub artifact: ArtifactDescriptor,
}

/// Trained classifier backing a model
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactDescriptor {
    /// ONNX export, path relative to the descriptor's directory
    Onnx { path: PathBuf },
    /// Multinomial logistic regression parameters
    Logistic {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        #[serde(default)]
        scaler: Option<StandardScaler>,
    },
}

impl ModelDescriptor {
    /// Parse a descriptor from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Resolve the descriptor into a model spec
    pub fn to_spec(&self) -> Result<ModelSpec, RegistryError> {
        let model_id = self.model_id;

        let (feature_names, default_locked) = match &self.features {
            Some(features) => (features.clone(), Vec::new()),
            None => {
                // Training-script layout: biomarkers are fixed at their means
                let mut features = self.biomarkers.clone();
                features.extend(self.linguistic.iter().cloned());
                (features, self.biomarkers.clone())
            }
        };
        let locked = self.locked_features.clone().unwrap_or(default_locked);

        let label_order = match (&self.classes, &self.label_map) {
            (Some(classes), None) => LabelOrder::from_classes(model_id, classes)?,
            (None, Some(label_map)) => LabelOrder::from_label_map(model_id, label_map)?,
            _ => {
                return Err(RegistryError::LabelOrder {
                    model_id,
                    reason: "exactly one of 'classes' or 'label_map' is required".to_string(),
                })
            }
        };

        ModelSpec::new(
            model_id,
            feature_names,
            self.feature_means.clone(),
            label_order,
            locked,
            self.biomarkers.clone(),
            self.capability,
        )
    }
}

/// Loader for model descriptors and their artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Read and parse a descriptor file
    pub fn read_descriptor<P: AsRef<Path>>(&self, path: P) -> Result<ModelDescriptor, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        ModelDescriptor::from_json(&text).map_err(|source| RegistryError::Descriptor {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the spec and scorer described by a descriptor
    pub fn build(
        &self,
        descriptor: &ModelDescriptor,
        base_dir: &Path,
    ) -> Result<(ModelSpec, Box<dyn Scorer>), RegistryError> {
        let spec = descriptor.to_spec()?;
        let model_id = spec.model_id;

        let scorer: Box<dyn Scorer> = match &descriptor.artifact {
            ArtifactDescriptor::Onnx { path } => {
                if ort::init().commit() {
                    info!(onnx_threads = self.onnx_threads, "ONNX Runtime initialized");
                }
                let path = base_dir.join(path);
                let scorer = OnnxScorer::load(&path, model_id.as_str(), self.onnx_threads, spec.capability)
                    .map_err(|e| RegistryError::Artifact {
                        model_id,
                        reason: format!("{:#}", e),
                    })?;
                Box::new(scorer)
            }
            ArtifactDescriptor::Logistic {
                coefficients,
                intercepts,
                feature_names,
                scaler,
            } => {
                let scorer = LogisticScorer::new(
                    coefficients.clone(),
                    intercepts.clone(),
                    scaler.clone(),
                    spec.capability,
                )
                .map_err(|e| RegistryError::Artifact {
                    model_id,
                    reason: e.to_string(),
                })?;

                match feature_names {
                    Some(names) => Box::new(scorer.with_feature_names(names.clone())),
                    None => Box::new(scorer),
                }
            }
        };

        Ok((spec, scorer))
    }

    /// Load a single model from its descriptor file
    pub fn load_model<P: AsRef<Path>>(
        &self,
        path: P,
        expected: ModelId,
    ) -> Result<(ModelSpec, Box<dyn Scorer>), RegistryError> {
        let path = path.as_ref();

        info!(model = %expected, path = %path.display(), "Loading model descriptor");

        let descriptor = self.read_descriptor(path)?;
        if descriptor.model_id != expected {
            return Err(RegistryError::Schema {
                model_id: expected,
                reason: format!(
                    "{} describes model {} instead",
                    path.display(),
                    descriptor.model_id
                ),
            });
        }

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.build(&descriptor, base_dir)
    }

    /// Load all configured models. Stops at the first failure.
    pub fn load_all_models(
        &self,
        config: &ModelsConfig,
    ) -> Result<Vec<(ModelSpec, Box<dyn Scorer>)>, RegistryError> {
        let models_dir = Path::new(&config.models_dir);
        let mut models = Vec::new();

        for model_id in ModelId::ALL {
            let path = models_dir.join(config.descriptors.file_for(model_id));
            models.push(self.load_model(&path, model_id)?);
        }

        info!(
            count = models.len(),
            "Loaded {} models from {}",
            models.len(),
            models_dir.display()
        );

        Ok(models)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
