//! Bounded retry over the items that failed in the previous attempt.
use anyhow::Result;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ragqa_core::config::{DriverSettings, RunnerSettings};
use ragqa_core::traits::{Generator, PromptTemplate};
use ragqa_core::types::Sample;
use ragqa_core::{GenericQaDataset, TimingLog};
use ragqa_retrieval::RetrievalAdapter;
use ragqa_runner::{ItemFailure, ProbaRecord, ResponseRecord, ResponseRunner, RunnerComponents, RunnerInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Proba(usize),
}

/// Positions refer to the list of samples handed to [`Driver::run`].
#[derive(Debug, Default)]
pub struct DriverOutcome {
    pub responses: Vec<ResponseRecord>,
    pub scores: Vec<ProbaRecord>,
    pub failed: Vec<ItemFailure>,
    pub attempts: usize,
    pub cache_hits: usize,
    pub timings: TimingLog,
    pub elapsed: Duration,
}

impl DriverOutcome {
    pub fn succeeded(&self) -> usize { self.responses.len() + self.scores.len() }
}

pub struct Driver {
    generator: Arc<dyn Generator>,
    template: Arc<dyn PromptTemplate>,
    settings: RunnerSettings,
    max_attempts: usize,
    wait_for_enter: bool,
}

impl Driver {
    pub fn new(generator: Arc<dyn Generator>, template: Arc<dyn PromptTemplate>, settings: RunnerSettings, driver: &DriverSettings) -> Self {
        Self { generator, template, settings, max_attempts: driver.max_attempts.max(1), wait_for_enter: driver.wait_for_enter }
    }

    /// Each attempt builds a fresh runner over the pending samples; the
    /// adapter, and with it the retrieval cache, carries over.
    pub fn run(&self, mut adapter: RetrievalAdapter, samples: Vec<Sample>, mode: Mode) -> Result<DriverOutcome> {
        let started = Instant::now();
        let mut outcome = DriverOutcome::default();
        let mut pending: Vec<(usize, Sample)> = samples.into_iter().enumerate().collect();

        for attempt in 1..=self.max_attempts {
            if pending.is_empty() { break; }
            if self.wait_for_enter { wait_for_enter(attempt, pending.len())?; }
            outcome.attempts = attempt;
            outcome.timings.mark(format!("attempt {}", attempt));
            tracing::info!(attempt, items = pending.len(), "starting attempt");

            let (origin, batch): (Vec<usize>, Vec<Sample>) = pending.iter().cloned().unzip();
            let components = RunnerComponents { generator: Arc::clone(&self.generator), template: Arc::clone(&self.template) };
            let input = RunnerInput::dataset(Arc::new(GenericQaDataset::from_samples(batch))).with_positions(origin);
            let mut runner = ResponseRunner::new(components, adapter, self.settings.clone(), input)?;

            let failures = match mode {
                Mode::Generate => {
                    let report = runner.run()?;
                    outcome.timings.extend(report.timings);
                    outcome.responses.extend(report.records);
                    report.failures
                }
                Mode::Proba(k) => {
                    let report = runner.get_probas(k)?;
                    outcome.timings.extend(report.timings);
                    outcome.scores.extend(report.scores);
                    report.failures
                }
            };
            adapter = runner.into_adapter();

            let failed: HashSet<usize> = failures.iter().map(|f| f.position).collect();
            pending.retain(|(position, _)| failed.contains(position));
            outcome.failed = failures;
            if !pending.is_empty() && attempt < self.max_attempts {
                tracing::warn!(attempt, remaining = pending.len(), "retrying failed items");
            }
        }

        outcome.responses.sort_by_key(|r| r.position);
        outcome.scores.sort_by_key(|r| r.position);
        outcome.cache_hits = adapter.cache_hits();
        outcome.timings.mark("driver finished");
        outcome.elapsed = started.elapsed();
        Ok(outcome)
    }
}

fn wait_for_enter(attempt: usize, items: usize) -> Result<()> {
    print!("Press ENTER to start attempt {} ({} items)... ", attempt, items);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
