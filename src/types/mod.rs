//! Type definitions for the prediction service

pub mod label;
pub mod prediction;
pub mod request;

pub use label::CanonicalLabel;
pub use prediction::{ClassPrediction, PredictionResult, PresentationCell, PresentationMatrix};
pub use request::{ErrorResponse, LinguisticPrediction, RouteResponse, SliderRequest, TokenCountRequest};
