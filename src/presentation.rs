//! Biomarker × group matrix for visualization clients

use crate::error::PredictError;
use crate::types::label::CanonicalLabel;
use crate::types::prediction::{PredictionResult, PresentationCell, PresentationMatrix};

/// Expand a prediction into one cell per (biomarker, group) pair.
///
/// Pure reshape: every cell of a group carries that group's probability.
pub fn expand<S: AsRef<str>>(
    result: &PredictionResult,
    biomarkers: &[S],
) -> Result<PresentationMatrix, PredictError> {
    let missing = result.missing_labels();
    if !missing.is_empty() {
        return Err(PredictError::IncompleteResult {
            model_id: result.model_id,
            missing,
        });
    }

    let mut matrix = Vec::with_capacity(biomarkers.len() * CanonicalLabel::ALL.len());
    for biomarker in biomarkers {
        for (&group, &value) in &result.probabilities {
            matrix.push(PresentationCell {
                biomarker: biomarker.as_ref().to_string(),
                group,
                value,
            });
        }
    }

    Ok(matrix)
}
