use herbal_lens_lib::services::species_catalog::{DESCRIPTION_PLACEHOLDER, USES_PLACEHOLDER};
use herbal_lens_lib::{
    Classifier, IdentifyError, LabelMap, PipelineConfig, PlantIdentifier, SpeciesCatalog,
    SpeciesInfo,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns the same scores for every input and counts calls.
struct FixedScores {
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedScores {
    fn new(scores: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedScores {
    fn predict(&self, _input: Array4<f32>) -> herbal_lens_lib::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

struct Failing;

impl Classifier for Failing {
    fn predict(&self, _input: Array4<f32>) -> herbal_lens_lib::Result<Vec<f32>> {
        Err(IdentifyError::Inference("out of memory".into()))
    }
}

/// Scores derived from the pixel data, to check the tensor actually reaches
/// the classifier.
struct Brightness;

impl Classifier for Brightness {
    fn predict(&self, input: Array4<f32>) -> herbal_lens_lib::Result<Vec<f32>> {
        let mean = input.mean().unwrap_or(0.0);
        Ok(vec![mean, 1.0 - mean])
    }
}

fn neem_tulasi() -> LabelMap {
    LabelMap::from_json(r#"{"Neem": 0, "Tulasi": 1}"#).unwrap()
}

fn neem_catalog() -> SpeciesCatalog {
    let mut entries = HashMap::new();
    entries.insert(
        "Neem".to_string(),
        SpeciesInfo {
            description: Some("A powerful medicinal tree...".to_string()),
            uses: vec![
                "Purifies blood".to_string(),
                "Treats skin disorders".to_string(),
            ],
        },
    );
    SpeciesCatalog::new(entries)
}

fn leaf_png() -> Vec<u8> {
    let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, 120, (y * 5) as u8]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn leaf_jpeg(rgb: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 30, Rgb(rgb)))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

#[test]
fn identifies_neem_with_metadata() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.82, 0.18]), neem_tulasi(), neem_catalog());

    let result = identifier.classify(&leaf_png()).unwrap();

    assert_eq!(result.species, "Neem");
    assert_eq!(result.class_index, 0);
    assert!((result.confidence - 82.0).abs() < 1e-3);
    assert!(!result.low_confidence);
    assert!(result.metadata_found);
    assert_eq!(result.description, "A powerful medicinal tree...");
    assert_eq!(result.uses, vec!["Purifies blood", "Treats skin disorders"]);
    assert!((result.probabilities[0] - 0.82).abs() < 1e-6);
    assert!((result.probabilities[1] - 0.18).abs() < 1e-6);
    assert_eq!(result.top_predictions[0].class_name, "Neem");
    assert_eq!(result.top_predictions[1].class_name, "Tulasi");
    assert!((result.top_predictions[1].confidence - 18.0).abs() < 1e-3);
}

#[test]
fn missing_metadata_falls_back_to_placeholder() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.40, 0.60]), neem_tulasi(), neem_catalog());

    let result = identifier.classify(&leaf_png()).unwrap();

    assert_eq!(result.species, "Tulasi");
    assert!((result.confidence - 60.0).abs() < 1e-3);
    assert!(!result.low_confidence);
    assert!(!result.metadata_found);
    assert_eq!(result.description, DESCRIPTION_PLACEHOLDER);
    assert_eq!(result.uses, vec![USES_PLACEHOLDER]);
}

#[test]
fn tie_below_threshold_is_low_confidence() {
    let labels = LabelMap::from_json(r#"{"Neem": 0, "Tulasi": 1, "Mint": 2}"#).unwrap();
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.45, 0.45, 0.10]), labels, neem_catalog());

    let result = identifier.classify(&leaf_png()).unwrap();

    assert_eq!(result.species, "Neem");
    assert!((result.confidence - 45.0).abs() < 1e-3);
    assert!(result.low_confidence);
}

#[test]
fn threshold_boundary_is_exclusive() {
    let labels = LabelMap::from_json(r#"{"Neem": 0, "Tulasi": 1, "Mint": 2}"#).unwrap();

    let at = PlantIdentifier::new(FixedScores::new(&[0.5, 0.25, 0.25]), labels.clone(), neem_catalog());
    let result = at.classify(&leaf_png()).unwrap();
    assert!((result.confidence - 50.0).abs() < 1e-4);
    assert!(!result.low_confidence);

    let below = PlantIdentifier::new(FixedScores::new(&[0.4999, 0.2501, 0.25]), labels, neem_catalog());
    let result = below.classify(&leaf_png()).unwrap();
    assert!((result.confidence - 49.99).abs() < 1e-3);
    assert!(result.low_confidence);
}

#[test]
fn custom_threshold_is_applied() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.82, 0.18]), neem_tulasi(), neem_catalog())
        .with_confidence_threshold(90.0);

    assert!(identifier.classify(&leaf_png()).unwrap().low_confidence);
}

#[test]
fn logits_are_normalized_before_percentages() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[3.0, -1.0]), neem_tulasi(), neem_catalog());

    let result = identifier.classify(&leaf_png()).unwrap();

    assert_eq!(result.species, "Neem");
    assert!(result.confidence > 50.0 && result.confidence <= 100.0);
    let sum: f32 = result.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
}

#[test]
fn unnormalized_probabilities_are_rescaled_not_softmaxed() {
    let labels = LabelMap::from_json(r#"{"Neem": 0, "Tulasi": 1, "Mint": 2}"#).unwrap();

    let identifier = PlantIdentifier::new(FixedScores::new(&[0.55, 0.30, 0.1515]), labels.clone(), neem_catalog());
    let result = identifier.classify(&leaf_png()).unwrap();
    assert_eq!(result.species, "Neem");
    assert!((result.confidence - 54.92).abs() < 1e-2);
    assert!(!result.low_confidence);

    let identifier = PlantIdentifier::new(FixedScores::new(&[0.9, 0.2, 0.0]), labels, neem_catalog());
    let result = identifier.classify(&leaf_png()).unwrap();
    assert!((result.confidence - 81.82).abs() < 1e-2);
    assert_eq!(result.probabilities[2], 0.0);
}

#[test]
fn config_settings_reach_classification() {
    let config = PipelineConfig {
        top_k: 1,
        confidence_threshold: 65.0,
        ..PipelineConfig::default()
    };
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.40, 0.60]), neem_tulasi(), neem_catalog())
        .with_config(&config);

    let result = identifier.classify(&leaf_png()).unwrap();

    assert_eq!(identifier.confidence_threshold(), 65.0);
    assert_eq!(result.species, "Tulasi");
    assert!((result.confidence - 60.0).abs() < 1e-3);
    assert!(result.low_confidence);
    assert_eq!(result.top_predictions.len(), 1);
    assert_eq!(result.top_predictions[0].class_name, "Tulasi");
}

#[test]
fn undecodable_bytes_never_reach_the_classifier() {
    let stub = FixedScores::new(&[0.82, 0.18]);
    let identifier = PlantIdentifier::new(stub.clone(), neem_tulasi(), neem_catalog());

    let png = leaf_png();
    let empty: &[u8] = &[];
    for bytes in [empty, &b"GIF89a but not really"[..], &png[..20]] {
        let err = identifier.classify(bytes).unwrap_err();
        assert!(matches!(err, IdentifyError::Decode(_)), "got {err:?}");
    }
    assert_eq!(stub.calls(), 0);
}

#[test]
fn classifier_failure_is_inference_error() {
    let identifier = PlantIdentifier::new(Arc::new(Failing), neem_tulasi(), neem_catalog());

    let err = identifier.classify(&leaf_png()).unwrap_err();
    assert!(matches!(err, IdentifyError::Inference(_)));
}

#[test]
fn wrong_width_or_non_finite_scores_are_rejected() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.2, 0.3, 0.5]), neem_tulasi(), neem_catalog());
    assert!(matches!(
        identifier.classify(&leaf_png()),
        Err(IdentifyError::Inference(_))
    ));

    let identifier = PlantIdentifier::new(FixedScores::new(&[f32::NAN, 0.5]), neem_tulasi(), neem_catalog());
    assert!(matches!(
        identifier.classify(&leaf_png()),
        Err(IdentifyError::Inference(_))
    ));
}

#[test]
fn classification_is_deterministic() {
    let identifier = PlantIdentifier::new(Arc::new(Brightness), neem_tulasi(), neem_catalog());
    let bytes = leaf_jpeg([200, 210, 190]);

    let first = identifier.classify(&bytes).unwrap();
    for _ in 0..3 {
        let again = identifier.classify(&bytes).unwrap();
        assert_eq!(again.class_index, first.class_index);
        assert_eq!(again.species, first.species);
        assert_eq!(again.confidence, first.confidence);
    }

    let dark = identifier.classify(&leaf_jpeg([10, 20, 15])).unwrap();
    assert_eq!(first.species, "Neem");
    assert_eq!(dark.species, "Tulasi");
}

#[test]
fn self_check_catches_width_mismatch() {
    let identifier = PlantIdentifier::new(FixedScores::new(&[0.2, 0.3, 0.5]), neem_tulasi(), neem_catalog());
    assert!(matches!(identifier.self_check(), Err(IdentifyError::Config(_))));

    let identifier = PlantIdentifier::new(FixedScores::new(&[0.82, 0.18]), neem_tulasi(), neem_catalog());
    let report = identifier.self_check().unwrap();
    assert_eq!(report.missing, vec!["Tulasi".to_string()]);
    assert!(report.orphaned.is_empty());
}

#[test]
fn identifier_is_shareable_across_threads() {
    let identifier = Arc::new(PlantIdentifier::new(
        FixedScores::new(&[0.82, 0.18]),
        neem_tulasi(),
        neem_catalog(),
    ));
    let bytes = Arc::new(leaf_png());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let identifier = identifier.clone();
            let bytes = bytes.clone();
            std::thread::spawn(move || identifier.classify(&bytes).unwrap().species)
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "Neem");
    }
}
