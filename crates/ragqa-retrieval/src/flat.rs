//! Brute-force retriever over vectors held in memory.
//!
//! Optionally carries pre-computed results (`query text -> passage ids`) so the
//! same retriever can serve the cached-results strategy.
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use ragqa_core::error::Error;
use ragqa_core::traits::{QueryEncoder, Retriever};
use ragqa_core::types::{DocIndex, Embedding, Passage};

use crate::rerank::euclidean_distance;

pub struct FlatRetriever {
    encoder: Box<dyn QueryEncoder>,
    vectors: Vec<Embedding>,
    precomputed: HashMap<String, Vec<String>>,
}

impl FlatRetriever {
    pub fn from_vectors(encoder: Box<dyn QueryEncoder>, vectors: Vec<Embedding>) -> Self {
        Self { encoder, vectors, precomputed: HashMap::new() }
    }

    /// Encode every passage with `encoder`, `batch_size` at a time.
    pub fn build(encoder: Box<dyn QueryEncoder>, passages: &[Passage], batch_size: usize) -> Result<Self> {
        let mut vectors = Vec::with_capacity(passages.len());
        for chunk in passages.chunks(batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(Passage::encoder_text).collect();
            vectors.extend(encoder.encode_queries(&texts)?);
        }
        tracing::info!(vectors = vectors.len(), "flat index built");
        Ok(Self::from_vectors(encoder, vectors))
    }

    pub fn with_precomputed(mut self, results: HashMap<String, Vec<String>>) -> Self {
        self.precomputed = results;
        self
    }

    /// Read a JSON object mapping query text to ranked passage ids.
    pub fn load_precomputed(self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let results: HashMap<String, Vec<String>> = serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(self.with_precomputed(results))
    }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    fn nearest(&self, query: &[f32], k: usize) -> Vec<DocIndex> {
        let mut scored: Vec<(f32, DocIndex)> = self.vectors.iter().enumerate().map(|(i, v)| (euclidean_distance(query, v), i)).collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(k).map(|(_, i)| i).collect()
    }
}

impl QueryEncoder for FlatRetriever {
    fn dim(&self) -> usize { self.encoder.dim() }
    fn encode_queries(&self, texts: &[String]) -> Result<Vec<Embedding>> { self.encoder.encode_queries(texts) }
}

impl Retriever for FlatRetriever {
    fn search(&self, embeddings: &[Embedding], k: usize) -> Result<Vec<Vec<DocIndex>>> {
        Ok(embeddings.iter().map(|e| self.nearest(e, k)).collect())
    }

    fn retrieve_ids(&self, queries: &[String], k: usize) -> Result<Vec<Vec<String>>> {
        queries
            .iter()
            .map(|q| {
                self.precomputed
                    .get(q)
                    .map(|ids| ids.iter().take(k).cloned().collect())
                    .ok_or_else(|| Error::NotFound(format!("no pre-computed results for query '{}'", q)).into())
            })
            .collect()
    }
}
