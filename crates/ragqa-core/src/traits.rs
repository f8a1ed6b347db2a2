//! Capability sets of the collaborators the runner drives.
//!
//! The runner only relies on these narrow contracts; concrete models, indexes
//! and collections live in the other crates of the workspace.

use crate::error::Error;
use crate::types::{DocIndex, Embedding, Passage, Sample, TokenProbability};

pub trait QueryEncoder: Send + Sync {
    fn dim(&self) -> usize;
    fn encode_queries(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>>;
}

pub trait Retriever: QueryEncoder {
    /// Nearest-neighbour search over the retriever's own index, one ranked
    /// list of at most `k` indices per query embedding.
    fn search(&self, embeddings: &[Embedding], k: usize) -> anyhow::Result<Vec<Vec<DocIndex>>>;

    /// Pre-computed results keyed by raw query text, as collection ids.
    fn retrieve_ids(&self, _queries: &[String], _k: usize) -> anyhow::Result<Vec<Vec<String>>> {
        Err(Error::Unsupported { component: "retriever", operation: "retrieve_ids" }.into())
    }
}

pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    /// Passages in the exact order of `indices`.
    fn passages_from_indices(&self, indices: &[DocIndex]) -> anyhow::Result<Vec<Passage>>;
    fn indices_from_ids(&self, ids: &[String]) -> anyhow::Result<Vec<DocIndex>>;
}

pub trait PromptTemplate: Send + Sync {
    fn render(&self, sample: &Sample, passages: &[Passage]) -> String;
}

pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    fn post_process_response(&self, response: &str) -> String { response.trim().to_string() }

    /// Top-`k` next-token probabilities for `prompt`, most likely first.
    fn score(&self, prompt: &str, k: usize) -> anyhow::Result<Vec<TokenProbability>>;
}

pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn samples(&self, range: std::ops::Range<usize>) -> &[Sample];
    fn get_queries(&self, batch: &[Sample]) -> Vec<String> { batch.iter().map(Sample::query_text).collect() }
}
