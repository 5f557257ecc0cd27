//! ONNX Runtime backed scorer

use crate::models::scorer::{argmax, Capability, RawOutput, Scorer};
use anyhow::{anyhow, bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, ValueType};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Classifier exported to ONNX (e.g. via skl2onnx)
pub struct OnnxScorer {
    /// Model name for log context
    name: String,
    /// Session; running it needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    probability_output: Option<String>,
    label_output: Option<String>,
    input_width: Option<usize>,
    class_count: Option<usize>,
    capability: Capability,
}

/// Last dimension of a tensor type, if static.
/// Dynamic dimensions are reported by ONNX Runtime as -1.
fn static_last_dim(value_type: &ValueType) -> Option<usize> {
    match value_type {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .copied()
            .filter(|&d| d > 0)
            .map(|d| d as usize),
        _ => None,
    }
}

/// Probabilities from zipmap pairs, ordered by class id.
/// Class ids must be exactly `0..n`.
fn ordered_class_probabilities(mut kv_pairs: Vec<(i64, f32)>) -> Result<Vec<f64>> {
    kv_pairs.sort_by_key(|(class_id, _)| *class_id);

    for (position, (class_id, _)) in kv_pairs.iter().enumerate() {
        if *class_id != position as i64 {
            bail!("class ids in zipmap output are not contiguous from 0");
        }
    }

    Ok(kv_pairs.into_iter().map(|(_, p)| p as f64).collect())
}

fn open_session(path: &Path, onnx_threads: usize) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(onnx_threads)?
        .commit_from_file(path)
}

impl OnnxScorer {
    /// Load an ONNX model from file
    pub fn load<P: AsRef<Path>>(
        path: P,
        name: &str,
        onnx_threads: usize,
        capability: Capability,
    ) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = open_session(path, onnx_threads)
            .context(format!("Failed to load model from {:?}", path))?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| anyhow!("model {} declares no inputs", name))?;
        let input_name = input.name().to_string();
        let input_width = static_last_dim(input.dtype());

        let probability = session.outputs().iter().find(|o| o.name().contains("prob"));
        let probability_output = probability.map(|o| o.name().to_string());
        let class_count = probability.and_then(|o| static_last_dim(o.dtype()));
        let label_output = session
            .outputs()
            .iter()
            .find(|o| o.name().contains("label"))
            .map(|o| o.name().to_string());

        match capability {
            Capability::Probabilities if probability_output.is_none() => {
                bail!("model {} has no probability output", name)
            }
            Capability::Label if label_output.is_none() && probability_output.is_none() => {
                bail!("model {} has neither a label nor a probability output", name)
            }
            _ => {}
        }

        info!(
            model = %name,
            input = %input_name,
            probabilities = ?probability_output,
            label = ?label_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            probability_output,
            label_output,
            input_width,
            class_count,
            capability,
        })
    }

    /// Extract the class probability row from the probability output.
    /// Handles plain tensors and seq(map(int64, float)) zipmap outputs.
    fn extract_probabilities(&self, outputs: &SessionOutputs) -> Result<Vec<f64>> {
        let output_name = self
            .probability_output
            .as_deref()
            .ok_or_else(|| anyhow!("no probability output"))?;
        let output = outputs
            .get(output_name)
            .ok_or_else(|| anyhow!("output '{}' missing from run", output_name))?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let classes = shape.last().copied().unwrap_or(data.len() as i64).max(0) as usize;
            if classes == 0 || data.len() < classes {
                bail!("probability tensor has shape {:?}", shape);
            }
            debug!(model = %self.name, classes = classes, "Extracted from tensor");
            return Ok(data[..classes].iter().map(|&p| p as f64).collect());
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(dtype) {
            return self.extract_from_sequence_map(output);
        }

        bail!("unsupported probability output type {:?}", dtype)
    }

    /// Extract probabilities from seq(map(int64, float)), ordered by class id
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<Vec<f64>> {
        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>()?;
        let map_value = maps.first().ok_or_else(|| anyhow!("Empty sequence"))?;

        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        let probabilities = ordered_class_probabilities(kv_pairs)?;

        debug!(model = %self.name, classes = probabilities.len(), "Extracted from seq(map)");
        Ok(probabilities)
    }

    fn extract_label(&self, outputs: &SessionOutputs) -> Result<i64> {
        if let Some(output) = self.label_output.as_deref().and_then(|name| outputs.get(name)) {
            if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
                return data
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow!("empty label tensor"));
            }
        }

        // String class labels cannot be indexed; fall back to the probability arg-max
        let probabilities = self.extract_probabilities(outputs)?;
        Ok(argmax(&probabilities) as i64)
    }
}

impl Scorer for OnnxScorer {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    fn score(&self, row: &[f64]) -> Result<RawOutput> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, row.len() as i64];
        let values: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, values)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        match self.capability {
            Capability::Probabilities => {
                Ok(RawOutput::Probabilities(self.extract_probabilities(&outputs)?))
            }
            Capability::Label => Ok(RawOutput::Label(self.extract_label(&outputs)?)),
        }
    }
}
