use crate::error::{IdentifyError, Result};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

/// Drift of a score vector's sum from 1 tolerated without a debug note.
const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// A trained model that maps one normalized image tensor to one score per
/// class. Implementations must be safe to call from several threads.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>>;
}

/// ONNX Runtime session behind a mutex; `run` needs exclusive access, so
/// concurrent callers are serialized through the single session.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxClassifier {
    pub fn load(model_path: &Path, use_gpu: bool, intra_threads: usize) -> Result<Self> {
        let _ = ort::init().with_name("herbal-lens").commit();

        let mut builder = Session::builder()
            .map_err(|e| IdentifyError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| IdentifyError::ModelLoad(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| IdentifyError::ModelLoad(format!("Failed to set intra threads: {}", e)))?;

        if use_gpu {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CoreMLExecutionProvider::default().build(),
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(|e| {
                    IdentifyError::ModelLoad(format!("Failed to register GPU execution providers: {}", e))
                })?;
        } else {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(|e| {
                    IdentifyError::ModelLoad(format!("Failed to register CPU execution provider: {}", e))
                })?;
        }

        let session = builder.commit_from_file(model_path).map_err(|e| {
            IdentifyError::ModelLoad(format!(
                "Failed to load ONNX model {}: {}",
                model_path.display(),
                e
            ))
        })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| IdentifyError::ModelLoad("Model declares no inputs".into()))?;

        tracing::info!(
            model = %model_path.display(),
            input = %input_name,
            use_gpu,
            "Loaded ONNX classifier"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input_tensor = Value::from_array(input)
            .map_err(|e| IdentifyError::Inference(format!("Failed to create tensor value: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| IdentifyError::Inference("Classifier session poisoned".into()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| IdentifyError::Inference(format!("Inference failed: {}", e)))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| IdentifyError::Inference("Model produced no outputs".into()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| IdentifyError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

/// Checks a raw score vector and turns it into probabilities. Non-negative
/// scores are divided by their sum, so confidence is the winner's share of
/// the total mass. Vectors with a negative entry, or all zeros, are treated
/// as logits and softmaxed.
pub fn to_probabilities(scores: &[f32], expected_len: usize) -> Result<Vec<f32>> {
    if scores.len() != expected_len {
        return Err(IdentifyError::Inference(format!(
            "Classifier returned {} scores, expected {}",
            scores.len(),
            expected_len
        )));
    }
    if scores.is_empty() {
        return Err(IdentifyError::Inference("Classifier returned no scores".into()));
    }
    if let Some(idx) = scores.iter().position(|s| !s.is_finite()) {
        return Err(IdentifyError::Inference(format!(
            "Classifier returned non-finite score {} at index {}",
            scores[idx], idx
        )));
    }

    let non_negative = scores.iter().all(|&s| s >= 0.0);
    let sum: f32 = scores.iter().sum();
    if non_negative && sum > 0.0 {
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            tracing::debug!(sum, "Scores do not sum to one, rescaling by their total");
        }
        return Ok(scores.iter().map(|&s| s / sum).collect());
    }

    tracing::debug!(sum, "Scores look like logits, applying softmax");
    Ok(softmax(scores))
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

/// The `k` most probable class indices, best first, ties in index order.
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    // Stable sort keeps index order among equal probabilities.
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}
