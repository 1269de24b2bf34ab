#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::PipelineConfig;
pub use error::{IdentifyError, Result};
pub use models::classify_types::{Identification, Prediction, SpeciesInfo};
pub use services::classifier::inference::{Classifier, OnnxClassifier};
pub use services::classifier::model_manager::ModelManager;
pub use services::classifier::pipeline::PlantIdentifier;
pub use services::label_map::LabelMap;
pub use services::species_catalog::SpeciesCatalog;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    logging::init();

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app
                .path()
                .app_data_dir()
                .expect("Failed to get app data directory");

            let model_manager = ModelManager::new(app_data_dir);
            std::fs::create_dir_all(&model_manager.model_dir)
                .expect("Failed to create model directory");
            if let Err(e) = model_manager.install_bundled_resources() {
                tracing::warn!("Could not install bundled label map and metadata: {}", e);
            }
            app.manage(model_manager.clone());

            // Load the classifier once at startup; the front end polls status.
            tauri::async_runtime::spawn(async move {
                if !model_manager.is_downloaded() {
                    tracing::warn!(
                        "ONNX model missing in {}, waiting for load_model",
                        model_manager.model_dir.display()
                    );
                    return;
                }
                if let Err(e) = model_manager.load_model(None).await {
                    tracing::error!("Startup model load failed: {}", e);
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::classifier::get_model_status,
            commands::classifier::load_model,
            commands::classifier::classify_leaf,
            commands::classifier::get_species,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
