use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;

use ragqa_core::config::RetrievalSettings;
use ragqa_core::error::Error;
use ragqa_core::traits::{DocumentCollection, Retriever};
use ragqa_core::types::{DocIndex, Embedding, Passage, StrategyKind};

use crate::cache::EmbeddingCache;
use crate::hosted::HostedRetriever;
use crate::rerank::rerank_passages;

/// Exactly one retrieval path is active per adapter.
pub enum RetrievalStrategy {
    Hosted(HostedRetriever),
    CachedResults,
    Local(EmbeddingCache),
}

impl RetrievalStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Hosted(_) => StrategyKind::Hosted,
            Self::CachedResults => StrategyKind::CachedResults,
            Self::Local(_) => StrategyKind::Local,
        }
    }
}

/// Ranked indices per query plus the embeddings computed along the way.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub indices: Vec<Vec<DocIndex>>,
    /// Only the local path encodes queries; empty otherwise.
    pub query_embeddings: Vec<Embedding>,
    pub strategy: StrategyKind,
    pub cache_hit: bool,
}

/// Passages ready for prompt formatting, after the optional rerank.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub passages: Vec<Vec<Passage>>,
    pub indices: Vec<Vec<DocIndex>>,
    pub strategy: StrategyKind,
    pub cache_hit: bool,
    pub reranked: bool,
}

pub struct RetrievalAdapter {
    strategy: RetrievalStrategy,
    retriever: Arc<dyn Retriever>,
    collection: Arc<dyn DocumentCollection>,
    k: usize,
    db_k: usize,
    cache_hits: usize,
}

impl RetrievalAdapter {
    pub fn new(strategy: RetrievalStrategy, retriever: Arc<dyn Retriever>, collection: Arc<dyn DocumentCollection>, k: usize, db_k: usize) -> Self {
        Self { strategy, retriever, collection, k, db_k: db_k.max(k), cache_hits: 0 }
    }

    /// Build the configured strategy. The hosted strategy needs `hosted_url`.
    pub fn from_settings(settings: &RetrievalSettings, retriever: Arc<dyn Retriever>, collection: Arc<dyn DocumentCollection>) -> Result<Self> {
        let strategy = match settings.strategy {
            StrategyKind::Hosted => {
                let url = settings.hosted_url.as_deref().filter(|u| !u.is_empty())
                    .ok_or_else(|| Error::InvalidConfig("retrieval.hosted_url is required for the hosted strategy".into()))?;
                RetrievalStrategy::Hosted(HostedRetriever::new(url, settings.timeout_secs.map(Duration::from_secs))?)
            }
            StrategyKind::CachedResults => RetrievalStrategy::CachedResults,
            StrategyKind::Local => RetrievalStrategy::Local(EmbeddingCache::new(settings.cache_depth, settings.cache_max_distance)),
        };
        tracing::info!(strategy = ?settings.strategy, k = settings.k, db_k = settings.db_k, "retrieval adapter ready");
        Ok(Self::new(strategy, retriever, collection, settings.k, settings.db_k))
    }

    pub fn kind(&self) -> StrategyKind { self.strategy.kind() }

    pub fn cache_hits(&self) -> usize { self.cache_hits }

    pub fn k(&self) -> usize { self.k }

    pub fn db_k(&self) -> usize { self.db_k }

    pub fn cache(&self) -> Option<&EmbeddingCache> {
        match &self.strategy { RetrievalStrategy::Local(c) => Some(c), _ => None }
    }

    pub fn retrieve(&mut self, queries: &[String]) -> Result<Retrieval> {
        let strategy = self.strategy.kind();
        let (mut indices, query_embeddings, cache_hit) = match &mut self.strategy {
            RetrievalStrategy::Hosted(client) => {
                (client.search(queries, self.k, self.collection.name())?, Vec::new(), false)
            }
            RetrievalStrategy::CachedResults => {
                let ids = self.retriever.retrieve_ids(queries, self.k)?;
                let indices = ids.iter().map(|x| self.collection.indices_from_ids(x)).collect::<Result<Vec<_>>>()?;
                (indices, Vec::new(), false)
            }
            RetrievalStrategy::Local(cache) => {
                let encoded = self.retriever.encode_queries(queries)?;
                let first = encoded.first().ok_or_else(|| anyhow!("encoder returned no embeddings for {} queries", queries.len()))?;
                if let Some(hit) = cache.find(first) {
                    self.cache_hits += 1;
                    tracing::debug!(hits = self.cache_hits, "retrieval cache hit");
                    (vec![hit], encoded, true)
                } else {
                    let indices = self.retriever.search(&encoded, self.db_k)?;
                    if let Some(top) = indices.first() { cache.insert(first.clone(), top.iter().copied().take(self.db_k).collect()); }
                    (indices, encoded, false)
                }
            }
        };
        let limit = if strategy == StrategyKind::Local { self.db_k } else { self.k };
        for list in &mut indices { list.truncate(limit); }
        Ok(Retrieval { indices, query_embeddings, strategy, cache_hit })
    }

    /// Retrieve, resolve passages, and rerank down to `k` when `db_k > k`.
    pub fn fetch(&mut self, queries: &[String]) -> Result<Fetched> {
        let retrieval = self.retrieve(queries)?;
        let mut passages = retrieval
            .indices
            .iter()
            .map(|idx| self.collection.passages_from_indices(idx))
            .collect::<Result<Vec<_>>>()?;
        let mut indices = retrieval.indices;
        let reranked = self.db_k > self.k;

        if reranked {
            for (q, (p, idx)) in passages.iter_mut().zip(indices.iter_mut()).enumerate() {
                let query_embedding = match retrieval.query_embeddings.get(q) {
                    Some(e) => e.clone(),
                    None => {
                        let text = queries.get(q).cloned().ok_or_else(|| anyhow!("no query text for result list {}", q))?;
                        self.retriever.encode_queries(&[text])?.into_iter().next().ok_or_else(|| anyhow!("encoder returned no embedding"))?
                    }
                };
                let (keep, kept) = rerank_passages(self.retriever.as_ref(), &query_embedding, std::mem::take(p), self.k)?;
                *idx = keep.iter().map(|&i| idx[i]).collect();
                *p = kept;
            }
        }

        Ok(Fetched { passages, indices, strategy: retrieval.strategy, cache_hit: retrieval.cache_hit, reranked })
    }
}
