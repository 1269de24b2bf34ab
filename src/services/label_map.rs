use crate::error::{IdentifyError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Index to species name mapping, inverted from the `class_indices.json`
/// resource written at training time (`{"Neem": 0, "Tulasi": 1, ...}`).
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IdentifyError::io(path, e))?;
        let indices: HashMap<String, usize> = serde_json::from_str(&content).map_err(|e| {
            IdentifyError::LabelMap(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Self::from_indices(indices).map_err(|e| match e {
            IdentifyError::LabelMap(msg) => {
                IdentifyError::LabelMap(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let indices: HashMap<String, usize> = serde_json::from_str(json)
            .map_err(|e| IdentifyError::LabelMap(format!("Failed to parse label map: {}", e)))?;
        Self::from_indices(indices)
    }

    /// Inverts a name to index map. Indices must be dense, 0-based and
    /// unique, and names non-empty.
    pub fn from_indices(indices: HashMap<String, usize>) -> Result<Self> {
        if indices.is_empty() {
            return Err(IdentifyError::LabelMap("label map is empty".into()));
        }

        let count = indices.len();
        let mut slots: Vec<Option<String>> = vec![None; count];
        for (name, idx) in indices {
            if name.trim().is_empty() {
                return Err(IdentifyError::LabelMap(format!(
                    "index {} has an empty species name",
                    idx
                )));
            }
            let slot = slots.get_mut(idx).ok_or_else(|| {
                IdentifyError::LabelMap(format!(
                    "index {} for '{}' is outside 0..{}",
                    idx, name, count
                ))
            })?;
            if let Some(existing) = slot {
                return Err(IdentifyError::LabelMap(format!(
                    "index {} is assigned to both '{}' and '{}'",
                    idx, existing, name
                )));
            }
            *slot = Some(name);
        }

        // With unique in-range indices every slot is filled, but keep the
        // check explicit so a gap can never become an unnamed class.
        let names = slots
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                name.ok_or_else(|| IdentifyError::LabelMap(format!("index {} has no name", idx)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { names })
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
