//! Test fixtures: three in-process models mirroring the served schemas.
//!
//! Each model uses a different raw class order so label mix-ups surface in
//! tests. Coefficients are illustrative, not trained.

use crate::models::normalizer::LabelOrder;
use crate::models::registry::{ModelId, ModelRegistry, ModelSpec};
use crate::models::scorer::{Capability, LogisticScorer, RawOutput, Scorer, StandardScaler};
use crate::types::label::CanonicalLabel;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN_FEATURE: &str = "tokens(participant)";

pub const BIOMARKERS: [&str; 3] = ["tTau_AB42Ratio", "AB42_AB40Ratio", "P_TAU_LUMI"];

pub const LINGUISTIC: [&str; 7] = [
    "AUX(participant)",
    "VERB(participant)",
    "CCONJ(participant)",
    "NUM(participant)",
    "PROPN(participant)",
    "TTR(participant)",
    "MATTR(participant)",
];

pub const TOKEN_FEATURES: [&str; 16] = [
    "tokens(participant)",
    "uniquetokens(participant)",
    "TTR(participant)",
    "MATTR(participant)",
    "VERB(participant)",
    "PROPN(participant)",
    "NUM(participant)",
    "AUX(participant)",
    "CCONJ(participant)",
    "AB40_LUMI",
    "AB42_LUMI",
    "P_TAU_LUMI",
    "T_TAU_LUMI",
    "AB42_AB40Ratio",
    "tTau_AB42Ratio",
    "pTau_AB42Ratio",
];

const MEANS: [(&str, f64); 16] = [
    ("tokens(participant)", 632.0),
    ("uniquetokens(participant)", 248.5),
    ("TTR(participant)", 0.371693437),
    ("MATTR(participant)", 0.9897507465),
    ("VERB(participant)", 75.8953488372093),
    ("PROPN(participant)", 20.0),
    ("NUM(participant)", 10.0),
    ("AUX(participant)", 47.73255813953488),
    ("CCONJ(participant)", 35.0),
    ("AB40_LUMI", 11410.4),
    ("AB42_LUMI", 788.0),
    ("P_TAU_LUMI", 39.25),
    ("T_TAU_LUMI", 316.5),
    ("AB42_AB40Ratio", 0.0866841479872977),
    ("tTau_AB42Ratio", 0.3271804698034205),
    ("pTau_AB42Ratio", 0.0385401194692728),
];

pub fn names(features: &[&str]) -> Vec<String> {
    features.iter().map(|s| s.to_string()).collect()
}

fn means_for(features: &[&str]) -> HashMap<String, f64> {
    let all: HashMap<&str, f64> = MEANS.into_iter().collect();
    features
        .iter()
        .map(|&name| (name.to_string(), all[name]))
        .collect()
}

pub fn linguistic_means() -> HashMap<String, f64> {
    means_for(&LINGUISTIC)
}

/// Order a string-labelled classifier reports: classes sorted by name
pub fn sorted_order(model_id: ModelId) -> LabelOrder {
    LabelOrder::from_labels(
        model_id,
        vec![
            CanonicalLabel::Mci,
            CanonicalLabel::Normal,
            CanonicalLabel::ProbableAd,
        ],
    )
    .unwrap()
}

fn full_model() -> (ModelSpec, Box<dyn Scorer>) {
    let mut features = names(&BIOMARKERS);
    features.extend(names(&LINGUISTIC));

    let spec = ModelSpec::new(
        ModelId::BiomarkerLinguistic,
        features.clone(),
        means_for(&[&BIOMARKERS[..], &LINGUISTIC[..]].concat()),
        LabelOrder::from_labels(ModelId::BiomarkerLinguistic, CanonicalLabel::ALL.to_vec()).unwrap(),
        names(&BIOMARKERS),
        names(&BIOMARKERS),
        Capability::Probabilities,
    )
    .unwrap();

    // Rows follow the raw order Normal, MCI, Prob AD
    let scorer = LogisticScorer::new(
        vec![
            vec![-2.1, 8.0, -0.02, 0.01, 0.015, 0.01, 0.02, 0.01, 1.5, 0.8],
            vec![0.4, -1.0, 0.005, -0.004, -0.002, 0.0, -0.01, 0.0, -0.3, -0.2],
            vec![1.7, -7.0, 0.015, -0.006, -0.013, -0.01, -0.01, -0.01, -1.2, -0.6],
        ],
        vec![-0.6, 0.3, 0.3],
        None,
        Capability::Probabilities,
    )
    .unwrap()
    .with_feature_names(features);

    (spec, Box::new(scorer))
}

/// Label-only linguistic classifier, raw order MCI, Normal, Prob AD
pub fn linguistic_scorer() -> LogisticScorer {
    LogisticScorer::new(
        vec![
            vec![-0.01, 0.0, 0.005, -0.01, 0.0, -0.4, -0.1],
            vec![0.02, 0.01, 0.01, 0.02, 0.01, 1.2, 0.5],
            vec![-0.01, -0.01, -0.015, -0.01, -0.01, -0.8, -0.4],
        ],
        vec![0.1, -0.5, 0.4],
        None,
        Capability::Label,
    )
    .unwrap()
}

fn linguistic_model() -> (ModelSpec, Box<dyn Scorer>) {
    let spec = ModelSpec::new(
        ModelId::LinguisticOnly,
        names(&LINGUISTIC),
        linguistic_means(),
        sorted_order(ModelId::LinguisticOnly),
        vec![],
        vec![],
        Capability::Label,
    )
    .unwrap();

    let scorer = linguistic_scorer().with_feature_names(names(&LINGUISTIC));
    (spec, Box::new(scorer))
}

fn token_model() -> (ModelSpec, Box<dyn Scorer>) {
    let spec = ModelSpec::new(
        ModelId::TokenCount,
        names(&TOKEN_FEATURES),
        means_for(&TOKEN_FEATURES),
        sorted_order(ModelId::TokenCount),
        vec![],
        names(&TOKEN_FEATURES[9..]),
        Capability::Probabilities,
    )
    .unwrap();

    let scaler = StandardScaler {
        mean: TOKEN_FEATURES
            .iter()
            .map(|name| spec.defaults[*name])
            .collect(),
        scale: vec![
            280.0, 90.0, 0.08, 0.005, 30.0, 10.0, 6.0, 20.0, 15.0, 3000.0, 250.0, 18.0, 150.0,
            0.02, 0.25, 0.03,
        ],
    };

    // Rows follow the raw order MCI, Normal, Prob AD
    let scorer = LogisticScorer::new(
        vec![
            vec![
                -0.1, -0.05, -0.1, 0.0, -0.05, 0.0, 0.0, -0.02, 0.0, 0.0, -0.1, 0.1, 0.1, -0.2,
                0.1, 0.1,
            ],
            vec![
                0.6, 0.3, 0.2, 0.1, 0.2, 0.1, 0.05, 0.1, 0.1, 0.05, 0.3, -0.4, -0.3, 0.5, -0.5,
                -0.4,
            ],
            vec![
                -0.5, -0.25, -0.1, -0.1, -0.15, -0.1, -0.05, -0.08, -0.1, -0.05, -0.2, 0.3, 0.2,
                -0.3, 0.4, 0.3,
            ],
        ],
        vec![0.0, 0.2, -0.2],
        Some(scaler),
        Capability::Probabilities,
    )
    .unwrap();

    (spec, Box::new(scorer))
}

/// Fixture models in `ModelId::ALL` order
pub fn models() -> Vec<(ModelSpec, Box<dyn Scorer>)> {
    vec![full_model(), linguistic_model(), token_model()]
}

pub fn registry() -> ModelRegistry {
    ModelRegistry::from_models(models(), TOKEN_FEATURE).unwrap()
}

/// Fixture registry with one model's scorer replaced
pub fn registry_with(model_id: ModelId, scorer: Box<dyn Scorer>) -> ModelRegistry {
    let entries = models()
        .into_iter()
        .map(|(mut spec, kept)| {
            if spec.model_id == model_id {
                spec.capability = scorer.capability();
                (spec, None)
            } else {
                (spec, Some(kept))
            }
        })
        .collect::<Vec<_>>();

    let mut scorer = Some(scorer);
    let entries = entries
        .into_iter()
        .map(|(spec, kept)| match kept {
            Some(kept) => (spec, kept),
            None => (spec, scorer.take().unwrap()),
        })
        .collect();

    ModelRegistry::from_models(entries, TOKEN_FEATURE).unwrap()
}

/// Fixture registry whose scorers count their invocations
pub fn counting_registry() -> (ModelRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let entries = models()
        .into_iter()
        .map(|(spec, inner)| {
            let counting: Box<dyn Scorer> = Box::new(CountingScorer {
                inner,
                calls: calls.clone(),
            });
            (spec, counting)
        })
        .collect();

    let registry = ModelRegistry::from_models(entries, TOKEN_FEATURE).unwrap();
    (registry, calls)
}

/// Delegates to an inner scorer and counts calls
pub struct CountingScorer {
    inner: Box<dyn Scorer>,
    calls: Arc<AtomicUsize>,
}

impl Scorer for CountingScorer {
    fn capability(&self) -> Capability {
        self.inner.capability()
    }

    fn input_width(&self) -> Option<usize> {
        self.inner.input_width()
    }

    fn class_count(&self) -> Option<usize> {
        self.inner.class_count()
    }

    fn score(&self, row: &[f64]) -> Result<RawOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.score(row)
    }
}

/// Always predicts the same raw index
pub struct FixedLabelScorer {
    width: usize,
    raw_index: i64,
}

impl FixedLabelScorer {
    pub fn new(width: usize, raw_index: i64) -> Self {
        Self { width, raw_index }
    }
}

impl Scorer for FixedLabelScorer {
    fn capability(&self) -> Capability {
        Capability::Label
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn class_count(&self) -> Option<usize> {
        None
    }

    fn score(&self, _row: &[f64]) -> Result<RawOutput> {
        Ok(RawOutput::Label(self.raw_index))
    }
}

/// Fails every call
pub struct FailingScorer {
    message: String,
}

impl FailingScorer {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Scorer for FailingScorer {
    fn capability(&self) -> Capability {
        Capability::Probabilities
    }

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn class_count(&self) -> Option<usize> {
        None
    }

    fn score(&self, _row: &[f64]) -> Result<RawOutput> {
        Err(anyhow!("{}", self.message))
    }
}

/// Blocks before answering; tracks how many calls overlap
pub struct SlowScorer {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl SlowScorer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of concurrent `score` calls seen
    pub fn peak_in_flight(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

impl Scorer for SlowScorer {
    fn capability(&self) -> Capability {
        Capability::Label
    }

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn class_count(&self) -> Option<usize> {
        None
    }

    fn score(&self, _row: &[f64]) -> Result<RawOutput> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawOutput::Label(0))
    }
}
