//! Client for a remote search service.
//!
//! `POST {url}` with `{"queries": [...], "k": k, "dataset": name}`; the
//! response is expected to carry an `indices` array of arrays. The payload is
//! read leniently: missing keys give empty lists, integral floats are accepted.
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

use ragqa_core::types::DocIndex;

#[derive(Debug, Serialize)]
pub struct HostedSearchRequest<'a> {
    pub queries: &'a [String],
    pub k: usize,
    pub dataset: &'a str,
}

pub struct HostedRetriever {
    client: reqwest::blocking::Client,
    url: String,
}

impl HostedRetriever {
    /// `timeout = None` waits indefinitely.
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url: url.to_string() })
    }

    pub fn search(&self, queries: &[String], k: usize, dataset: &str) -> Result<Vec<Vec<DocIndex>>> {
        let body = HostedSearchRequest { queries, k, dataset };
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .with_context(|| format!("Hosted search request to {} failed", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("Hosted search returned {}: {}", status, body);
        }

        let payload: serde_json::Value = resp.json().context("Failed to parse hosted search response")?;
        let indices = parse_indices(&payload);
        tracing::debug!(queries = queries.len(), k, lists = indices.len(), "hosted search");
        Ok(indices)
    }
}

pub fn parse_indices(payload: &serde_json::Value) -> Vec<Vec<DocIndex>> {
    let Some(outer) = payload.get("indices").and_then(serde_json::Value::as_array) else { return Vec::new() };
    outer
        .iter()
        .map(|row| row.as_array().map(|r| r.iter().filter_map(as_index).collect()).unwrap_or_default())
        .collect()
}

fn as_index(v: &serde_json::Value) -> Option<DocIndex> {
    if let Some(u) = v.as_u64() { return usize::try_from(u).ok(); }
    let f = v.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 { Some(f as usize) } else { None }
}
