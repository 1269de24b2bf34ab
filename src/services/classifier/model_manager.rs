use crate::config::PipelineConfig;
use crate::error::{IdentifyError, Result};
use crate::models::classify_types::{Identification, ModelStatus};
use crate::services::classifier::inference::OnnxClassifier;
use crate::services::classifier::pipeline::PlantIdentifier;
use crate::services::label_map::LabelMap;
use crate::services::species_catalog::SpeciesCatalog;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Label map and species metadata shipped with the application. The ONNX
/// model itself is not bundled.
const BUNDLED_LABELS: &str = include_str!("../../../data/class_indices.json");
const BUNDLED_METADATA: &str = include_str!("../../../data/species_metadata.json");

/// Builds a ready identifier from configuration: label map, catalog and ONNX
/// session, followed by the startup self-check.
pub fn load_identifier(config: &PipelineConfig) -> Result<PlantIdentifier> {
    config.validate()?;

    let labels = LabelMap::load(&config.labels_path)?;
    let catalog = SpeciesCatalog::load(&config.metadata_path)?;
    tracing::info!(
        classes = labels.len(),
        species_with_metadata = catalog.len(),
        "Loaded label map and species catalog"
    );

    let classifier = OnnxClassifier::load(&config.model_path, config.use_gpu, config.intra_threads)?;
    let identifier = PlantIdentifier::new(Arc::new(classifier), labels, catalog).with_config(config);

    let report = identifier.self_check()?;
    if !report.missing.is_empty() {
        tracing::warn!(
            "{} of {} species have no metadata and will show placeholders",
            report.missing.len(),
            identifier.labels().len()
        );
    }

    Ok(identifier)
}

/// Long-lived owner of the loaded pipeline. Cloning shares the same state.
#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    identifier: Arc<RwLock<Option<Arc<PlantIdentifier>>>>,
    loading: Arc<Mutex<bool>>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(app_data_dir: PathBuf) -> Self {
        let model_dir = app_data_dir.join("models");
        Self {
            model_dir,
            identifier: Arc::new(RwLock::new(None)),
            loading: Arc::new(Mutex::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> Result<PipelineConfig> {
        PipelineConfig::load_or_default(&self.model_dir)
    }

    /// Writes the bundled label map and species metadata to the configured
    /// paths when they are missing. Existing files are never overwritten.
    /// Returns the paths that were written.
    pub fn install_bundled_resources(&self) -> Result<Vec<PathBuf>> {
        let config = self.config()?;
        let mut written = Vec::new();
        for (path, content) in [
            (&config.labels_path, BUNDLED_LABELS),
            (&config.metadata_path, BUNDLED_METADATA),
        ] {
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| IdentifyError::io(parent, e))?;
            }
            std::fs::write(path, content).map_err(|e| IdentifyError::io(path, e))?;
            tracing::info!(path = %path.display(), "Installed bundled resource");
            written.push(path.clone());
        }
        Ok(written)
    }

    pub fn is_downloaded(&self) -> bool {
        self.config().map(|c| c.artifacts_present()).unwrap_or(false)
    }

    pub fn is_ready(&self) -> bool {
        self.identifier
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.lock().await
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            artifacts_present: self.is_downloaded(),
            loading: self.is_loading().await,
            ready: self.is_ready(),
            error: self.get_error().await,
        }
    }

    /// Loads (or reloads) the pipeline. `use_gpu` overrides the config value.
    pub async fn load_model(&self, use_gpu: Option<bool>) -> Result<()> {
        {
            let mut loading = self.loading.lock().await;
            if *loading {
                return Err(IdentifyError::ModelLoad("Model is already loading".into()));
            }
            *loading = true;
        }

        *self.error.lock().await = None;

        let result = self.do_load_model(use_gpu).await;

        *self.loading.lock().await = false;

        if let Err(ref e) = result {
            tracing::error!(error = %e, "Model load failed");
            *self.error.lock().await = Some(e.to_string());
        }

        result
    }

    async fn do_load_model(&self, use_gpu: Option<bool>) -> Result<()> {
        let mut config = self.config()?;
        if let Some(use_gpu) = use_gpu {
            config.use_gpu = use_gpu;
        }

        let identifier = tokio::task::spawn_blocking(move || load_identifier(&config))
            .await
            .map_err(|e| IdentifyError::ModelLoad(format!("Failed to spawn model loading task: {}", e)))??;

        self.install(identifier)
    }

    /// Makes `identifier` the active pipeline, replacing any previous one.
    pub fn install(&self, identifier: PlantIdentifier) -> Result<()> {
        let mut guard = self
            .identifier
            .write()
            .map_err(|_| IdentifyError::ModelLoad("Model state poisoned".into()))?;
        *guard = Some(Arc::new(identifier));
        Ok(())
    }

    pub fn identifier(&self) -> Result<Arc<PlantIdentifier>> {
        self.identifier
            .read()
            .map_err(|_| IdentifyError::ModelLoad("Model state poisoned".into()))?
            .clone()
            .ok_or(IdentifyError::NotLoaded)
    }

    /// Runs the pipeline on a blocking thread.
    pub async fn classify(&self, image_bytes: Vec<u8>) -> Result<Identification> {
        let identifier = self.identifier()?;
        tokio::task::spawn_blocking(move || identifier.classify(&image_bytes))
            .await
            .map_err(|e| IdentifyError::Inference(format!("Classification task failed: {}", e)))?
    }
}
