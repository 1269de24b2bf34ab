use crate::config::PipelineConfig;
use crate::error::{IdentifyError, Result};
use crate::models::classify_types::{Identification, Prediction};
use crate::services::classifier::inference::{self, Classifier};
use crate::services::classifier::preprocess::Preprocessor;
use crate::services::label_map::LabelMap;
use crate::services::species_catalog::{self, CatalogReport, SpeciesCatalog};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 50.0;
const DEFAULT_TOP_K: usize = 5;

/// Decode, infer, rank and enrich one leaf photograph at a time.
///
/// The classifier, label map and catalog are fixed at construction and only
/// read afterwards, so one identifier can be shared across threads.
pub struct PlantIdentifier {
    classifier: Arc<dyn Classifier>,
    labels: LabelMap,
    catalog: SpeciesCatalog,
    preprocessor: Preprocessor,
    confidence_threshold: f32,
    top_k: usize,
}

impl PlantIdentifier {
    pub fn new(classifier: Arc<dyn Classifier>, labels: LabelMap, catalog: SpeciesCatalog) -> Self {
        Self {
            classifier,
            labels,
            catalog,
            preprocessor: Preprocessor::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Applies the preprocessing, threshold and ranking settings of `config`.
    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_preprocessor(Preprocessor {
            input_size: config.input_size,
            normalization: config.normalization,
            layout: config.layout,
        })
        .with_confidence_threshold(config.confidence_threshold)
        .with_top_k(config.top_k)
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn catalog(&self) -> &SpeciesCatalog {
        &self.catalog
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Startup check: probes the classifier with a blank tensor to confirm
    /// its output width matches the label map, and reports catalog gaps.
    pub fn self_check(&self) -> Result<CatalogReport> {
        let scores = self.classifier.predict(self.preprocessor.blank_tensor())?;
        if scores.len() != self.labels.len() {
            return Err(IdentifyError::Config(format!(
                "Classifier emits {} scores but the label map has {} classes",
                scores.len(),
                self.labels.len()
            )));
        }

        let report = self.catalog.validate_against(&self.labels);
        for species in &report.missing {
            tracing::warn!(%species, "No description or uses for species");
        }
        for species in &report.orphaned {
            tracing::warn!(%species, "Species metadata has no matching label");
        }
        Ok(report)
    }

    pub fn classify(&self, image_bytes: &[u8]) -> Result<Identification> {
        let tensor = self.preprocessor.preprocess_bytes(image_bytes)?;

        let start = Instant::now();
        let scores = self.classifier.predict(tensor)?;
        let inference_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let probabilities = inference::to_probabilities(&scores, self.labels.len())?;
        let class_index = inference::argmax(&probabilities)
            .ok_or_else(|| IdentifyError::Inference("Classifier returned no scores".into()))?;
        let species = self.class_name(class_index)?;
        let confidence = to_percent(probabilities[class_index]);
        let low_confidence = is_low_confidence(confidence, self.confidence_threshold);

        let (description, uses, metadata_found) =
            species_catalog::resolve_details(self.catalog.lookup(&species));

        let top_predictions = inference::top_k(&probabilities, self.top_k)
            .into_iter()
            .map(|(idx, p)| -> Result<Prediction> {
                Ok(Prediction {
                    class_index: idx,
                    class_name: self.class_name(idx)?,
                    confidence: to_percent(p),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            %species,
            confidence,
            low_confidence,
            metadata_found,
            inference_time_ms,
            "Classified leaf image"
        );

        Ok(Identification {
            class_index,
            species,
            confidence,
            low_confidence,
            description,
            uses,
            metadata_found,
            probabilities,
            top_predictions,
            inference_time_ms,
        })
    }

    fn class_name(&self, index: usize) -> Result<String> {
        self.labels.name(index).map(str::to_string).ok_or_else(|| {
            IdentifyError::Inference(format!("Class index {} has no label", index))
        })
    }
}

fn to_percent(probability: f32) -> f32 {
    (probability * 100.0).clamp(0.0, 100.0)
}

/// Below the threshold is low confidence; exactly at it is not.
pub fn is_low_confidence(confidence: f32, threshold: f32) -> bool {
    confidence < threshold
}
