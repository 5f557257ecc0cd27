//! Request and reply payloads exchanged over the transport

use crate::error::PredictError;
use crate::types::label::CanonicalLabel;
use crate::types::prediction::PresentationMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Slider values sent by the UI, keyed by feature name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SliderRequest {
    #[serde(default)]
    pub sliders: HashMap<String, f64>,
}

/// Token count request for the token-driven model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCountRequest {
    pub num_tokens: i64,
}

/// Reply of the linguistic-only route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticPrediction {
    pub prediction: CanonicalLabel,
    pub prediction_value: usize,
}

/// Structured failure reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Error")]
    pub error: String,
    pub kind: String,
}

impl From<&PredictError> for ErrorResponse {
    fn from(err: &PredictError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

/// Successful reply of any route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteResponse {
    Matrix(PresentationMatrix),
    Linguistic(LinguisticPrediction),
    Percentages(BTreeMap<CanonicalLabel, f64>),
}

/// Encode a route outcome as the JSON reply body
pub fn encode_reply(outcome: &Result<RouteResponse, PredictError>) -> serde_json::Result<Vec<u8>> {
    match outcome {
        Ok(response) => serde_json::to_vec(response),
        Err(err) => serde_json::to_vec(&ErrorResponse::from(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::ModelId;

    #[test]
    fn test_slider_request_defaults_to_empty() {
        let request: SliderRequest = serde_json::from_str("{}").unwrap();
        assert!(request.sliders.is_empty());
    }

    #[test]
    fn test_percentage_reply_keys() {
        let mut percentages = BTreeMap::new();
        percentages.insert(CanonicalLabel::ProbableAd, 20.0);
        percentages.insert(CanonicalLabel::Normal, 50.0);
        percentages.insert(CanonicalLabel::Mci, 30.0);

        let body = encode_reply(&Ok(RouteResponse::Percentages(percentages))).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, r#"{"Normal":50.0,"MCI":30.0,"Probable-AD":20.0}"#);
    }

    #[test]
    fn test_linguistic_reply_shape() {
        let response = RouteResponse::Linguistic(LinguisticPrediction {
            prediction: CanonicalLabel::Mci,
            prediction_value: 0,
        });

        let body = encode_reply(&Ok(response)).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, r#"{"prediction":"MCI","prediction_value":0}"#);
    }

    #[test]
    fn test_error_reply_shape() {
        let err = PredictError::Inference {
            model_id: ModelId::TokenCount,
            message: "session closed".to_string(),
        };

        let body = encode_reply(&Err(err)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "inference");
        assert!(json["Error"].as_str().unwrap().contains("token_count"));
        assert!(json["Error"].as_str().unwrap().contains("session closed"));
    }
}
