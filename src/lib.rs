//! AD Prediction Service Library
//!
//! Serves Normal / MCI / Probable-AD predictions from three classifiers with
//! different feature schemas and class orders. Caller overrides are
//! reconciled against population-mean defaults, scored by the right model,
//! and reported in one canonical label space.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_reconciler;
pub mod models;
pub mod presentation;
pub mod producer;
pub mod router;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{PredictError, RegistryError};
pub use feature_reconciler::{FeatureOverrides, FeatureReconciler, FeatureVector};
pub use models::registry::{ModelId, ModelRegistry};
pub use producer::ReplyProducer;
pub use router::{InferenceRouter, Route};
pub use types::{label::CanonicalLabel, prediction::PredictionResult};
