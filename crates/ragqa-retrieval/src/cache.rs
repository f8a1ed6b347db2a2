//! In-memory retrieval cache keyed by query embedding.
//!
//! Bounded to `depth` entries with FIFO eviction. Lookups are approximate:
//! the closest stored key within `max_distance` (Euclidean) wins. Not
//! synchronized; the runner owns it exclusively.
use std::collections::VecDeque;

use ragqa_core::types::{DocIndex, Embedding};

use crate::rerank::euclidean_distance;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: Embedding,
    pub indices: Vec<DocIndex>,
}

#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    entries: VecDeque<CacheEntry>,
    depth: usize,
    max_distance: f32,
}

impl EmbeddingCache {
    pub fn new(depth: usize, max_distance: f32) -> Self {
        Self { entries: VecDeque::with_capacity(depth), depth, max_distance }
    }

    /// A zero-depth cache: inserts are dropped and lookups always miss.
    pub fn disabled() -> Self { Self::new(0, 0.0) }

    pub fn capacity(&self) -> usize { self.depth }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn insert(&mut self, key: Embedding, indices: Vec<DocIndex>) {
        if self.depth == 0 { return; }
        while self.entries.len() >= self.depth { self.entries.pop_front(); }
        self.entries.push_back(CacheEntry { key, indices });
    }

    /// Newest entries are scanned first, so among equally close keys the
    /// most recent one is returned.
    pub fn find(&self, key: &[f32]) -> Option<Vec<DocIndex>> {
        let mut best: Option<(f32, &CacheEntry)> = None;
        for entry in self.entries.iter().rev().take(self.depth) {
            if entry.key.len() != key.len() { continue; }
            let d = euclidean_distance(&entry.key, key);
            if d.is_nan() || d > self.max_distance { continue; }
            if best.map_or(true, |(bd, _)| d < bd) { best = Some((d, entry)); }
        }
        best.map(|(_, e)| e.indices.clone())
    }
}
