use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or running the identification pipeline.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The uploaded bytes are not a JPEG or PNG image we can read.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The classifier failed or produced an unusable score vector.
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid label map: {0}")]
    LabelMap(String),

    #[error("Invalid species catalog: {0}")]
    Catalog(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model not loaded. Call load_model first.")]
    NotLoaded,

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IdentifyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IdentifyError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentifyError::Decode(_) => "decode",
            IdentifyError::Inference(_) => "inference",
            IdentifyError::LabelMap(_) => "label_map",
            IdentifyError::Catalog(_) => "catalog",
            IdentifyError::Config(_) => "config",
            IdentifyError::ModelLoad(_) => "model_load",
            IdentifyError::NotLoaded => "not_loaded",
            IdentifyError::Io { .. } => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentifyError>;

/// Error shape handed across the command boundary to the front end.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub kind: String,
    pub message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<IdentifyError> for AppError {
    fn from(err: IdentifyError) -> Self {
        AppError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError {
            kind: "other".to_string(),
            message: msg,
        }
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError {
            kind: "other".to_string(),
            message: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_keeps_kind() {
        let err: AppError = IdentifyError::Decode("truncated header".into()).into();
        assert_eq!(err.kind, "decode");
        assert_eq!(err.message, "Failed to decode image: truncated header");

        let err: AppError = IdentifyError::NotLoaded.into();
        assert_eq!(err.kind, "not_loaded");
    }

    #[test]
    fn test_app_error_serializes() {
        let err: AppError = "boom".into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "other");
        assert_eq!(json["message"], "boom");
    }
}
