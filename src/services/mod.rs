pub mod classifier;
pub mod label_map;
pub mod species_catalog;
pub mod upload;
