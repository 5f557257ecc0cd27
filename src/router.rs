//! Inference router: one route per served model.
//!
//! Every route runs the same three phases: validate the overrides, reconcile
//! them into the model's feature row, score the row and normalize the raw
//! output into canonical labels.

use crate::error::PredictError;
use crate::feature_reconciler::{validate_overrides, FeatureOverrides, FeatureReconciler};
use crate::models::normalizer::normalize;
use crate::models::registry::{ModelId, ModelRegistry};
use crate::presentation::expand;
use crate::types::label::CanonicalLabel;
use crate::types::prediction::{PredictionResult, PresentationMatrix};
use crate::types::request::{LinguisticPrediction, RouteResponse, SliderRequest, TokenCountRequest};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, warn};

/// Request routes, one per model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Predict,
    PredictLinguisticOnly,
    PredictFromTokenCount,
}

impl Route {
    pub const ALL: [Route; 3] = [
        Route::Predict,
        Route::PredictLinguisticOnly,
        Route::PredictFromTokenCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Predict => "predict",
            Route::PredictLinguisticOnly => "predict_linguistic_only",
            Route::PredictFromTokenCount => "predict_from_token_count",
        }
    }

    /// Model served by this route
    pub fn model_id(&self) -> ModelId {
        match self {
            Route::Predict => ModelId::BiomarkerLinguistic,
            Route::PredictLinguisticOnly => ModelId::LinguisticOnly,
            Route::PredictFromTokenCount => ModelId::TokenCount,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::ALL
            .into_iter()
            .find(|route| route.as_str() == s)
            .ok_or_else(|| PredictError::UnknownModel(s.to_string()))
    }
}

/// Router dispatching requests to the registered models
pub struct InferenceRouter {
    registry: Arc<ModelRegistry>,
    reconciler: FeatureReconciler,
}

impl InferenceRouter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        let reconciler = FeatureReconciler::new(registry.clone());
        Self {
            registry,
            reconciler,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Full biomarker + linguistic model, expanded into the presentation matrix
    pub fn predict(&self, sliders: &FeatureOverrides) -> Result<PresentationMatrix, PredictError> {
        let result = self.infer(ModelId::BiomarkerLinguistic, sliders)?;
        let spec = self.registry.get_model_spec(ModelId::BiomarkerLinguistic)?;
        expand(&result, &spec.biomarkers)
    }

    /// Linguistic-only classifier: predicted label and its raw index
    pub fn predict_linguistic_only(
        &self,
        sliders: &FeatureOverrides,
    ) -> Result<LinguisticPrediction, PredictError> {
        let result = self.infer(ModelId::LinguisticOnly, sliders)?;
        let predicted = result.predicted.ok_or(PredictError::IncompleteResult {
            model_id: ModelId::LinguisticOnly,
            missing: CanonicalLabel::ALL.to_vec(),
        })?;

        Ok(LinguisticPrediction {
            prediction: predicted.label,
            prediction_value: predicted.raw_index,
        })
    }

    /// Token-count model; percentages per canonical label
    pub fn predict_from_token_count(
        &self,
        num_tokens: i64,
    ) -> Result<BTreeMap<CanonicalLabel, f64>, PredictError> {
        let token_feature = self.registry.token_feature();
        if num_tokens < 0 {
            return Err(PredictError::InvalidFeatureValue {
                feature: token_feature.to_string(),
                reason: format!("token count {} is negative", num_tokens),
            });
        }

        let mut overrides = FeatureOverrides::new();
        overrides.insert(token_feature.to_string(), num_tokens as f64);

        let result = self.infer(ModelId::TokenCount, &overrides)?;
        let missing = result.missing_labels();
        if !missing.is_empty() {
            return Err(PredictError::IncompleteResult {
                model_id: ModelId::TokenCount,
                missing,
            });
        }

        Ok(result.percentages())
    }

    /// Validate, reconcile, score and normalize for one model
    pub fn infer(
        &self,
        model_id: ModelId,
        overrides: &FeatureOverrides,
    ) -> Result<PredictionResult, PredictError> {
        validate_overrides(overrides)?;

        let model = self.registry.model(model_id)?;
        let features = self.reconciler.reconcile(model_id, overrides)?;

        let start = Instant::now();
        let raw = model
            .scorer
            .score(features.as_slice())
            .map_err(|e| PredictError::Inference {
                model_id,
                message: format!("{:#}", e),
            })?;

        let result = normalize(&model.spec, raw)?;

        debug!(
            model = %model_id,
            overrides = overrides.len(),
            predicted = ?result.predicted.map(|p| p.label),
            inference_us = start.elapsed().as_micros(),
            "Inference complete"
        );

        Ok(result)
    }

    /// Dispatch a raw request body to a route by name
    pub fn handle(&self, route: &str, payload: &[u8]) -> Result<RouteResponse, PredictError> {
        let route: Route = route.parse()?;
        self.handle_route(route, payload)
    }

    fn handle_route(&self, route: Route, payload: &[u8]) -> Result<RouteResponse, PredictError> {
        match route {
            Route::Predict => {
                let request: SliderRequest = decode(payload)?;
                self.predict(&request.sliders).map(RouteResponse::Matrix)
            }
            Route::PredictLinguisticOnly => {
                let request: SliderRequest = decode(payload)?;
                self.predict_linguistic_only(&request.sliders)
                    .map(RouteResponse::Linguistic)
            }
            Route::PredictFromTokenCount => {
                let request: TokenCountRequest = decode(payload)?;
                self.predict_from_token_count(request.num_tokens)
                    .map(RouteResponse::Percentages)
            }
        }
    }

    /// Handle a request on the blocking pool, bounded by `timeout`.
    ///
    /// `permit` is released when scoring finishes, even if the caller has
    /// already been answered with a timeout. Errors are logged here with
    /// route and model context.
    pub async fn handle_with_timeout(
        self: Arc<Self>,
        route: &str,
        payload: Vec<u8>,
        timeout: Duration,
        permit: OwnedSemaphorePermit,
    ) -> Result<RouteResponse, PredictError> {
        let outcome = match route.parse::<Route>() {
            Ok(route) => self.run_blocking(route, payload, timeout, permit).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            if e.is_caller_error() {
                warn!(route = %route, kind = e.kind(), error = %e, "Request rejected");
            } else {
                error!(route = %route, kind = e.kind(), error = %e, "Request failed");
            }
        }

        outcome
    }

    async fn run_blocking(
        self: Arc<Self>,
        route: Route,
        payload: Vec<u8>,
        timeout: Duration,
        permit: OwnedSemaphorePermit,
    ) -> Result<RouteResponse, PredictError> {
        let model_id = route.model_id();
        let task = tokio::task::spawn_blocking(move || {
            let outcome = self.handle_route(route, &payload);
            drop(permit);
            outcome
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => Err(PredictError::Inference {
                model_id,
                message: format!("scoring task failed: {}", join_error),
            }),
            Err(_) => Err(PredictError::Timeout {
                model_id,
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PredictError> {
    serde_json::from_slice(payload).map_err(PredictError::malformed)
}
