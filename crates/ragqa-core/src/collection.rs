use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::traits::DocumentCollection;
use crate::types::{DocIndex, Passage};

/// Passages held in a `Vec`, addressed by position.
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    name: String,
    passages: Vec<Passage>,
    by_id: HashMap<String, DocIndex>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>, passages: Vec<Passage>) -> Self {
        let by_id = passages.iter().enumerate().map(|(i, p)| (p.id.clone(), i)).collect();
        Self { name: name.into(), passages, by_id }
    }
}

impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str { &self.name }

    fn len(&self) -> usize { self.passages.len() }

    fn passages_from_indices(&self, indices: &[DocIndex]) -> Result<Vec<Passage>> {
        indices
            .iter()
            .map(|&i| self.passages.get(i).cloned().ok_or_else(|| anyhow!("index {} out of range for collection '{}' ({} passages)", i, self.name, self.passages.len())))
            .collect()
    }

    fn indices_from_ids(&self, ids: &[String]) -> Result<Vec<DocIndex>> {
        ids.iter()
            .map(|id| self.by_id.get(id).copied().ok_or_else(|| anyhow!("unknown passage id '{}' in collection '{}'", id, self.name)))
            .collect()
    }
}
