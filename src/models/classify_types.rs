use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub artifacts_present: bool,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
    /// Percentage in `[0, 100]`.
    pub confidence: f32,
}

/// Static description and medicinal uses of one species.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SpeciesInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uses: Vec<String>,
}

/// Everything the front end needs to render one classification.
#[derive(Debug, Serialize, Clone)]
pub struct Identification {
    pub class_index: usize,
    pub species: String,
    /// Winning probability as a percentage in `[0, 100]`.
    pub confidence: f32,
    pub low_confidence: bool,
    pub description: String,
    pub uses: Vec<String>,
    /// False when the description and uses are placeholders.
    pub metadata_found: bool,
    /// Normalized probability for every class, in label order.
    pub probabilities: Vec<f32>,
    pub top_predictions: Vec<Prediction>,
    pub inference_time_ms: f64,
}
