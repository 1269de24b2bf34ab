pub mod inference;
pub mod model_manager;
pub mod pipeline;
pub mod preprocess;
