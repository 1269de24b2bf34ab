use crate::error::{IdentifyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "herbal-lens.json";

/// Largest accepted model input edge, in pixels.
pub const MAX_INPUT_SIZE: u32 = 4096;

/// Pixel value transform applied after resizing. Must match the transform the
/// model artifact was trained with; a mismatch degrades accuracy silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `x / 255`
    #[default]
    Rescale,
    /// `(x / 255 - mean) / std` with the ImageNet statistics.
    Imagenet,
    /// `x / 127.5 - 1`
    Symmetric,
    /// Raw `0..=255` values, for models that rescale internally.
    Raw,
}

/// Memory layout of the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, the layout of Keras exports.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub metadata_path: PathBuf,
    pub input_size: u32,
    pub normalization: Normalization,
    pub layout: TensorLayout,
    /// Percentage below which a result is flagged low-confidence.
    pub confidence_threshold: f32,
    pub top_k: usize,
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("herbal_model.onnx"),
            labels_path: PathBuf::from("class_indices.json"),
            metadata_path: PathBuf::from("species_metadata.json"),
            input_size: 224,
            normalization: Normalization::default(),
            layout: TensorLayout::default(),
            confidence_threshold: 50.0,
            top_k: 5,
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

impl PipelineConfig {
    /// Reads a config file. Relative artifact paths resolve against the
    /// directory containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IdentifyError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            IdentifyError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = config.resolve_relative(base);
        config.validate()?;
        Ok(config)
    }

    /// Loads `herbal-lens.json` from `dir` if present, otherwise the defaults
    /// rooted at `dir`.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::info!("No {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
            Ok(Self::default().resolve_relative(dir))
        }
    }

    pub fn resolve_relative(mut self, base: &Path) -> Self {
        for path in [
            &mut self.model_path,
            &mut self.labels_path,
            &mut self.metadata_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size > MAX_INPUT_SIZE {
            return Err(IdentifyError::Config(format!(
                "input_size must be within 1..={}, got {}",
                MAX_INPUT_SIZE, self.input_size
            )));
        }
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(IdentifyError::Config(format!(
                "confidence_threshold must be within [0, 100], got {}",
                self.confidence_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(IdentifyError::Config("top_k must be at least 1".into()));
        }
        if self.intra_threads == 0 {
            return Err(IdentifyError::Config("intra_threads must be at least 1".into()));
        }
        Ok(())
    }

    pub fn artifacts_present(&self) -> bool {
        self.model_path.exists() && self.labels_path.exists() && self.metadata_path.exists()
    }
}
