use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ragqa_core::config::{expand_path, RunnerSettings};
use ragqa_core::error::Error;
use ragqa_core::traits::{Dataset, Generator, PromptTemplate};
use ragqa_core::types::{DocIndex, Passage, Sample};
use ragqa_core::{GenericQaDataset, TimingLog};
use ragqa_retrieval::RetrievalAdapter;

use crate::output::append_jsonl;
use crate::report::{ItemFailure, ProbaRecord, ProbaReport, ResponseRecord, RunReport};

pub struct RunnerComponents {
    pub generator: Arc<dyn Generator>,
    pub template: Arc<dyn PromptTemplate>,
}

/// Exactly one of `dataset` and `queries` must be set.
///
/// `positions`, when set, gives the position reported for each item in
/// records and failures (one per item); otherwise items report their index.
#[derive(Default)]
pub struct RunnerInput {
    pub dataset: Option<Arc<dyn Dataset>>,
    pub queries: Option<Vec<String>>,
    pub positions: Option<Vec<usize>>,
}

impl RunnerInput {
    pub fn queries(queries: Vec<String>) -> Self { Self { queries: Some(queries), ..Self::default() } }
    pub fn dataset(dataset: Arc<dyn Dataset>) -> Self { Self { dataset: Some(dataset), ..Self::default() } }

    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = Some(positions);
        self
    }
}

/// Prompts for one retrieval call, in batch order.
#[derive(Debug, Clone)]
pub struct RagCall {
    pub prompts: Vec<String>,
    pub indices: Vec<Vec<DocIndex>>,
    pub elapsed: Duration,
    pub cache_hit: bool,
}

struct Prepared {
    prompt: String,
    indices: Vec<DocIndex>,
    elapsed: Duration,
    cache_hit: bool,
}

/// Fetch, format, generate, record; one query at a time.
pub struct ResponseRunner {
    generator: Arc<dyn Generator>,
    template: Arc<dyn PromptTemplate>,
    adapter: RetrievalAdapter,
    dataset: Arc<dyn Dataset>,
    positions: Vec<usize>,
    settings: RunnerSettings,
    output_path: Option<PathBuf>,
}

impl ResponseRunner {
    pub fn new(components: RunnerComponents, adapter: RetrievalAdapter, settings: RunnerSettings, input: RunnerInput) -> Result<Self> {
        let dataset: Arc<dyn Dataset> = match (input.dataset, input.queries) {
            (Some(dataset), None) => dataset,
            (None, Some(queries)) => Arc::new(GenericQaDataset::from_queries(queries)),
            _ => return Err(Error::InvalidConfig("Either dataset or queries should be specified, but not both".into()).into()),
        };
        let positions = match input.positions {
            Some(p) if p.len() != dataset.len() => {
                return Err(Error::InvalidConfig(format!("{} positions given for {} items", p.len(), dataset.len())).into());
            }
            Some(p) => p,
            None => (0..dataset.len()).collect(),
        };
        if settings.batch_size > 1 {
            tracing::debug!(batch_size = settings.batch_size, "generation runs one query per call; batch_size is not applied");
        }
        let output_path = settings.output_path.as_deref().map(expand_path);
        Ok(Self { generator: components.generator, template: components.template, adapter, dataset, positions, settings, output_path })
    }

    pub fn len(&self) -> usize { self.dataset.len() }

    pub fn is_empty(&self) -> bool { self.dataset.is_empty() }

    pub fn cache_hits(&self) -> usize { self.adapter.cache_hits() }

    fn reported_position(&self, index: usize) -> usize { self.positions.get(index).copied().unwrap_or(index) }

    /// Hand the adapter (and its cache) back for the next runner.
    pub fn into_adapter(self) -> RetrievalAdapter { self.adapter }

    pub fn post_process_response(&self, response: &str) -> String {
        self.generator.post_process_response(response)
    }

    pub fn rag_call(&mut self, batch: &[Sample], queries: &[String]) -> Result<RagCall> {
        let t1 = Instant::now();
        let fetched = self.adapter.fetch(queries)?;
        let prompts = batch
            .iter()
            .enumerate()
            .map(|(i, sample)| self.template.render(sample, fetched.passages.get(i).map(Vec::as_slice).unwrap_or(&[])))
            .collect();
        Ok(RagCall { prompts, indices: fetched.indices, elapsed: t1.elapsed(), cache_hit: fetched.cache_hit })
    }

    fn prepare(&mut self, sample: &Sample, query: &str) -> Result<Prepared> {
        if !self.settings.use_rag {
            let prompt = self.template.render(sample, &[Passage::not_found()]);
            return Ok(Prepared { prompt, indices: Vec::new(), elapsed: Duration::ZERO, cache_hit: false });
        }
        let call = self.rag_call(std::slice::from_ref(sample), &[query.to_string()])?;
        let prompt = call.prompts.into_iter().next().unwrap_or_default();
        let indices = call.indices.into_iter().next().unwrap_or_default();
        Ok(Prepared { prompt, indices, elapsed: call.elapsed, cache_hit: call.cache_hit })
    }

    fn answer(&mut self, position: usize, sample: &Sample, query: &str, timings: &mut TimingLog) -> Result<ResponseRecord> {
        let prepared = self.prepare(sample, query)?;
        timings.record("retrieval", prepared.elapsed);
        let t = Instant::now();
        let raw = self.generator.generate(&prepared.prompt)?;
        timings.record("generation", t.elapsed());
        let response = if self.settings.post_process_response { self.post_process_response(&raw) } else { raw };
        Ok(ResponseRecord {
            position,
            id: sample.id.clone(),
            question: query.to_string(),
            prompt: prepared.prompt,
            response,
            answer: sample.answer.clone(),
            retrieved_indices: prepared.indices,
            retrieval_secs: prepared.elapsed.as_secs_f64(),
            cache_hit: prepared.cache_hit,
        })
    }

    fn score(&mut self, position: usize, sample: &Sample, query: &str, k: usize, timings: &mut TimingLog) -> Result<ProbaRecord> {
        let prepared = self.prepare(sample, query)?;
        timings.record("retrieval", prepared.elapsed);
        let t = Instant::now();
        let scores = self.generator.score(&prepared.prompt, k)?;
        timings.record("scoring", t.elapsed());
        Ok(ProbaRecord {
            position,
            id: sample.id.clone(),
            question: query.to_string(),
            scores,
            answer: sample.answer.clone(),
            retrieved_indices: prepared.indices,
            retrieval_secs: prepared.elapsed.as_secs_f64(),
        })
    }

    /// Generate a response for every query. Failing queries are reported,
    /// not fatal; only output I/O errors abort the run.
    pub fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport::default();
        report.timings.mark("run started");
        let dataset = Arc::clone(&self.dataset);
        let pb = progress_bar(dataset.len());
        let interval = self.settings.logging_interval.max(1);
        let mut pending = Vec::new();

        for index in 0..dataset.len() {
            let batch = dataset.samples(index..index + 1);
            let queries = dataset.get_queries(batch);
            let (Some(sample), Some(query)) = (batch.first(), queries.first()) else { continue };
            let position = self.reported_position(index);
            tracing::debug!(position, id = %sample.id, "answering");
            match self.answer(position, sample, query, &mut report.timings) {
                Ok(record) => {
                    report.retrieval_secs.push(record.retrieval_secs);
                    pending.push(record.clone());
                    report.records.push(record);
                }
                Err(e) => report.failures.push(failure(position, sample, query, &e)),
            }
            if pending.len() >= interval { self.write_results_to_file(&pending)?; pending.clear(); }
            pb.inc(1);
        }
        self.write_results_to_file(&pending)?;
        pb.finish_and_clear();

        report.cache_hits = self.adapter.cache_hits();
        report.timings.mark("run finished");
        tracing::info!(succeeded = report.records.len(), failed = report.failures.len(), cache_hits = report.cache_hits, "run complete");
        Ok(report)
    }

    /// Top-`k` next-token probabilities per query. Nothing is written to disk.
    pub fn get_probas(&mut self, k: usize) -> Result<ProbaReport> {
        let mut report = ProbaReport::default();
        report.timings.mark("scoring started");
        let dataset = Arc::clone(&self.dataset);
        let pb = progress_bar(dataset.len());

        for index in 0..dataset.len() {
            let batch = dataset.samples(index..index + 1);
            let queries = dataset.get_queries(batch);
            let (Some(sample), Some(query)) = (batch.first(), queries.first()) else { continue };
            let position = self.reported_position(index);
            match self.score(position, sample, query, k, &mut report.timings) {
                Ok(record) => {
                    report.retrieval_secs.push(record.retrieval_secs);
                    report.scores.push(record);
                }
                Err(e) => report.failures.push(failure(position, sample, query, &e)),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.cache_hits = self.adapter.cache_hits();
        report.timings.mark("scoring finished");
        tracing::info!(scored = report.scores.len(), failed = report.failures.len(), "scoring complete");
        Ok(report)
    }

    pub fn write_results_to_file<T: Serialize>(&self, results: &[T]) -> Result<()> {
        match &self.output_path {
            Some(path) => append_jsonl(path, results),
            None => Ok(()),
        }
    }
}

fn failure(position: usize, sample: &Sample, query: &str, err: &anyhow::Error) -> ItemFailure {
    tracing::warn!(position, id = %sample.id, error = %format!("{:#}", err), "query failed");
    ItemFailure { position, sample_id: sample.id.clone(), query: query.to_string(), error: format!("{:#}", err) }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
