use crate::error::AppError;
use crate::models::classify_types::{Identification, ModelStatus, SpeciesInfo};
use crate::services::classifier::model_manager::ModelManager;
use crate::services::upload;
use tauri::State;

#[tauri::command]
pub async fn get_model_status(model_manager: State<'_, ModelManager>) -> Result<ModelStatus, AppError> {
    Ok(model_manager.status().await)
}

#[tauri::command]
pub async fn load_model(
    model_manager: State<'_, ModelManager>,
    use_gpu: Option<bool>,
) -> Result<(), AppError> {
    if !model_manager.is_downloaded() {
        return Err(format!(
            "Model files not found in {}",
            model_manager.model_dir.display()
        )
        .into());
    }
    Ok(model_manager.load_model(use_gpu).await?)
}

#[tauri::command]
pub async fn classify_leaf(
    model_manager: State<'_, ModelManager>,
    image: String,
) -> Result<Identification, AppError> {
    let bytes = upload::decode_upload(&image)?;
    Ok(model_manager.classify(bytes).await?)
}

#[tauri::command]
pub async fn get_species(
    model_manager: State<'_, ModelManager>,
    name: String,
) -> Result<Option<SpeciesInfo>, AppError> {
    let identifier = model_manager.identifier()?;
    Ok(identifier.catalog().lookup(&name).cloned())
}
