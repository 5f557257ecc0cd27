//! Error taxonomy for request handling and registry loading

use crate::models::registry::ModelId;
use crate::types::label::CanonicalLabel;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single prediction request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("unknown model or route '{0}'")]
    UnknownModel(String),

    #[error("invalid value for feature '{feature}': {reason}")]
    InvalidFeatureValue { feature: String, reason: String },

    #[error("model {model_id} has no default for feature '{feature}'")]
    MissingDefault { model_id: ModelId, feature: String },

    #[error("inference failed for model {model_id}: {message}")]
    Inference { model_id: ModelId, message: String },

    #[error("model {model_id} produced raw index {raw_index} with no canonical label")]
    OutOfRange { model_id: ModelId, raw_index: i64 },

    #[error("model {model_id} produced {actual} probabilities for {expected} classes")]
    ClassCountMismatch {
        model_id: ModelId,
        expected: usize,
        actual: usize,
    },

    #[error("prediction from model {model_id} is missing {missing:?}")]
    IncompleteResult {
        model_id: ModelId,
        missing: Vec<CanonicalLabel>,
    },

    #[error("model {model_id} did not answer within {timeout_ms} ms")]
    Timeout { model_id: ModelId, timeout_ms: u64 },
}

impl PredictError {
    /// Malformed request body
    pub fn malformed(reason: impl ToString) -> Self {
        PredictError::InvalidFeatureValue {
            feature: "<body>".to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable kind used in error replies
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::UnknownModel(_) => "unknown_model",
            PredictError::InvalidFeatureValue { .. } => "invalid_feature_value",
            PredictError::MissingDefault { .. } => "missing_default",
            PredictError::Inference { .. } => "inference",
            PredictError::OutOfRange { .. } | PredictError::ClassCountMismatch { .. } => {
                "out_of_range"
            }
            PredictError::IncompleteResult { .. } => "incomplete_result",
            PredictError::Timeout { .. } => "timeout",
        }
    }

    /// Whether the caller caused the failure (as opposed to a server fault)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PredictError::UnknownModel(_) | PredictError::InvalidFeatureValue { .. }
        )
    }
}

/// Failure while building the model registry at startup
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model descriptor {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model {model_id} has no default for feature '{feature}'")]
    MissingDefault { model_id: ModelId, feature: String },

    #[error("model {model_id} schema mismatch: {reason}")]
    Schema { model_id: ModelId, reason: String },

    #[error("model {model_id} label order is invalid: {reason}")]
    LabelOrder { model_id: ModelId, reason: String },

    #[error("model {model_id} artifact is invalid: {reason}")]
    Artifact { model_id: ModelId, reason: String },

    #[error("model {0} is not configured")]
    NotConfigured(ModelId),
}
