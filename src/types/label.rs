//! Canonical diagnostic labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Diagnostic group exposed at the service boundary.
///
/// Declaration order is the canonical order (Normal, MCI, Probable-AD) and
/// drives `Ord`, so ordered maps keyed by label iterate canonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalLabel {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "MCI")]
    Mci,
    #[serde(rename = "Probable-AD")]
    ProbableAd,
}

impl CanonicalLabel {
    /// All labels in canonical order
    pub const ALL: [CanonicalLabel; 3] = [
        CanonicalLabel::Normal,
        CanonicalLabel::Mci,
        CanonicalLabel::ProbableAd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalLabel::Normal => "Normal",
            CanonicalLabel::Mci => "MCI",
            CanonicalLabel::ProbableAd => "Probable-AD",
        }
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw class name that does not correspond to any diagnostic group
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized diagnostic label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for CanonicalLabel {
    type Err = UnknownLabel;

    /// Parses the class names written by the training scripts
    /// ("Prob AD", "ProbAD", ...) as well as the canonical spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "normal" | "nc" | "cn" => Ok(CanonicalLabel::Normal),
            "mci" => Ok(CanonicalLabel::Mci),
            "probad" | "probablead" | "ad" => Ok(CanonicalLabel::ProbableAd),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}
