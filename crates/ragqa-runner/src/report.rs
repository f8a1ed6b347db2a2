use serde::{Deserialize, Serialize};

use ragqa_core::types::{DocIndex, TokenProbability};
use ragqa_core::TimingLog;

/// One processed query, as written to the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub position: usize,
    pub id: String,
    pub question: String,
    pub prompt: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub retrieved_indices: Vec<DocIndex>,
    pub retrieval_secs: f64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbaRecord {
    pub position: usize,
    pub id: String,
    pub question: String,
    pub scores: Vec<TokenProbability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub retrieved_indices: Vec<DocIndex>,
    pub retrieval_secs: f64,
}

/// A query whose pipeline failed; the rest of the batch still ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub position: usize,
    pub sample_id: String,
    pub query: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub records: Vec<ResponseRecord>,
    pub failures: Vec<ItemFailure>,
    /// Seconds spent fetching passages, one entry per completed query.
    pub retrieval_secs: Vec<f64>,
    pub cache_hits: usize,
    pub timings: TimingLog,
}

#[derive(Debug, Clone, Default)]
pub struct ProbaReport {
    pub scores: Vec<ProbaRecord>,
    pub failures: Vec<ItemFailure>,
    pub retrieval_secs: Vec<f64>,
    pub cache_hits: usize,
    pub timings: TimingLog,
}
