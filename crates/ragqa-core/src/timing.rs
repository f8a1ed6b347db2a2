//! Ordered log of named checkpoints, returned from each call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub stage: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
}

/// Entries are only ever appended; merging keeps both sides in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingLog {
    entries: Vec<TimingEntry>,
}

impl TimingLog {
    pub fn new() -> Self { Self::default() }

    /// Record that `stage` started now.
    pub fn mark(&mut self, stage: impl Into<String>) {
        self.entries.push(TimingEntry { stage: stage.into(), at: Utc::now(), elapsed_secs: None });
    }

    /// Record that `stage` finished now after `elapsed`.
    pub fn record(&mut self, stage: impl Into<String>, elapsed: Duration) {
        self.entries.push(TimingEntry { stage: stage.into(), at: Utc::now(), elapsed_secs: Some(elapsed.as_secs_f64()) });
    }

    pub fn extend(&mut self, other: TimingLog) { self.entries.extend(other.entries); }

    pub fn entries(&self) -> &[TimingEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Most recent entry for `stage`.
    pub fn get(&self, stage: &str) -> Option<&TimingEntry> {
        self.entries.iter().rev().find(|e| e.stage == stage)
    }

    /// Seconds between consecutive checkpoints, labelled by the earlier one.
    pub fn spans(&self) -> Vec<(String, f64)> {
        self.entries
            .windows(2)
            .map(|w| {
                let delta = (w[1].at - w[0].at).num_microseconds().unwrap_or(0) as f64 / 1e6;
                (w[0].stage.clone(), delta)
            })
            .collect()
    }
}
