use anyhow::{Context, Result};
use std::path::Path;

use ragqa_core::types::Sample;

/// Positional ids continue after `offset`.
pub fn samples_from_queries(queries: &[String], offset: usize) -> Vec<Sample> {
    queries.iter().enumerate().map(|(i, q)| Sample::new((offset + i).to_string(), q.clone())).collect()
}

/// `.jsonl` files hold one serialized [`Sample`] per line; any other file is
/// one question per non-empty line.
pub fn load_queries_file(path: &Path) -> Result<Vec<Sample>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
    if path.extension().is_some_and(|e| e == "jsonl") {
        lines
            .enumerate()
            .map(|(n, l)| serde_json::from_str::<Sample>(l).with_context(|| format!("{}:{}: invalid sample", path.display(), n + 1)))
            .collect()
    } else {
        let queries: Vec<String> = lines.map(str::to_string).collect();
        Ok(samples_from_queries(&queries, 0))
    }
}
