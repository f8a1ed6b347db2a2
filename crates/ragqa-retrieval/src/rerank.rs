//! Distance-based filtering of over-fetched candidates.
//!
//! The `k` closest passages are kept, then put back in retrieval order.
use anyhow::{Result, anyhow};

use ragqa_core::traits::QueryEncoder;
use ragqa_core::types::Passage;

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Positions of the `k` candidates closest to `query`, in ascending position order.
///
/// Equal distances are resolved by position.
pub fn select_closest(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(f32, usize)> = candidates.iter().enumerate().map(|(i, c)| (euclidean_distance(query, c), i)).collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut chosen: Vec<usize> = scored.into_iter().take(k).map(|(_, i)| i).collect();
    chosen.sort_unstable();
    chosen
}

/// Re-encode `passages`, keep the `k` closest to `query_embedding`.
///
/// Returns the kept positions alongside the passages.
pub fn rerank_passages<E: QueryEncoder + ?Sized>(encoder: &E, query_embedding: &[f32], passages: Vec<Passage>, k: usize) -> Result<(Vec<usize>, Vec<Passage>)> {
    if passages.is_empty() { return Ok((Vec::new(), passages)); }
    let texts: Vec<String> = passages.iter().map(Passage::encoder_text).collect();
    let encoded = encoder.encode_queries(&texts)?;
    if encoded.len() != passages.len() {
        return Err(anyhow!("encoder returned {} embeddings for {} passages", encoded.len(), passages.len()));
    }
    let keep = select_closest(query_embedding, &encoded, k);
    let mut slots: Vec<Option<Passage>> = passages.into_iter().map(Some).collect();
    let kept = keep.iter().filter_map(|&i| slots[i].take()).collect();
    Ok((keep, kept))
}
