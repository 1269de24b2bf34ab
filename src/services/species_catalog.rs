use crate::error::{IdentifyError, Result};
use crate::models::classify_types::SpeciesInfo;
use crate::services::label_map::LabelMap;
use std::collections::HashMap;
use std::path::Path;

pub const DESCRIPTION_PLACEHOLDER: &str = "Description not available.";
pub const USES_PLACEHOLDER: &str = "Medicinal uses not available.";

/// Read-only description and uses table keyed by species name.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    entries: HashMap<String, SpeciesInfo>,
}

/// Mismatches between a catalog and the label map it serves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogReport {
    /// Labels the classifier can emit that have no catalog entry.
    pub missing: Vec<String>,
    /// Catalog entries no label refers to.
    pub orphaned: Vec<String>,
}

impl CatalogReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

impl SpeciesCatalog {
    pub fn new(entries: HashMap<String, SpeciesInfo>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IdentifyError::io(path, e))?;
        let entries: HashMap<String, SpeciesInfo> = serde_json::from_str(&content)
            .map_err(|e| IdentifyError::Catalog(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(entries))
    }

    /// Absence is expected for some species and is not an error.
    pub fn lookup(&self, species: &str) -> Option<&SpeciesInfo> {
        self.entries.get(species)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate_against(&self, labels: &LabelMap) -> CatalogReport {
        let missing = labels
            .names()
            .iter()
            .filter(|name| !self.entries.contains_key(name.as_str()))
            .cloned()
            .collect();

        let mut orphaned: Vec<String> = self
            .entries
            .keys()
            .filter(|name| !labels.names().contains(*name))
            .cloned()
            .collect();
        orphaned.sort();

        CatalogReport { missing, orphaned }
    }
}

/// Description and uses to display for a species, with the placeholder
/// policy applied when the catalog has no entry.
pub fn resolve_details(entry: Option<&SpeciesInfo>) -> (String, Vec<String>, bool) {
    match entry {
        Some(info) => {
            let description = info
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DESCRIPTION_PLACEHOLDER.to_string());
            let uses = if info.uses.is_empty() {
                vec![USES_PLACEHOLDER.to_string()]
            } else {
                info.uses.clone()
            };
            (description, uses, true)
        }
        None => (
            DESCRIPTION_PLACEHOLDER.to_string(),
            vec![USES_PLACEHOLDER.to_string()],
            false,
        ),
    }
}
