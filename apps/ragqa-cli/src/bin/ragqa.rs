use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ragqa_cli::args::USAGE;
use ragqa_cli::{load_queries_file, parse_run_args, samples_from_queries, Driver, DriverOutcome, Mode, RunArgs};
use ragqa_core::config::{Config, Settings};
use ragqa_core::prompt::load_template;
use ragqa_core::traits::{DocumentCollection, Generator, PromptTemplate, Retriever};
use ragqa_core::types::StrategyKind;
use ragqa_core::TimingLog;
use ragqa_embed::get_default_encoder;
use ragqa_generation::load_generator;
use ragqa_retrieval::{FlatRetriever, LanceCollection, LanceIndex, LanceRetriever, RetrievalAdapter};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "run" => run(&settings, parse_run_args(&args)?),
        _ => { eprintln!("Unknown command: {}\n{}", cmd, USAGE); std::process::exit(1); }
    }
}

fn run(settings: &Settings, args: RunArgs) -> Result<()> {
    let mut samples = match &args.queries_file { Some(path) => load_queries_file(path)?, None => Vec::new() };
    samples.extend(samples_from_queries(&args.queries, samples.len()));

    let mut timings = TimingLog::new();
    timings.mark("started load_model");
    let generator: Arc<dyn Generator> = Arc::from(load_generator(&settings.generator)?);
    timings.mark("started load_collection");
    let collection_name = settings.lance.collection_name.clone().unwrap_or_else(|| settings.lance.collection_table.clone());
    let collection: Arc<dyn DocumentCollection> = Arc::new(LanceCollection::load(&settings.lance.uri, &settings.lance.collection_table, &collection_name)?);
    let retriever = load_retriever(settings, &mut timings)?;
    timings.mark("started load_template");
    let template: Arc<dyn PromptTemplate> = Arc::from(load_template(&settings.runner.template)?);
    timings.mark("all loaded");
    print_timings("Load timings", &timings);

    let adapter = RetrievalAdapter::from_settings(&settings.retrieval, retriever, collection)?;
    let mode = args.proba.map_or(Mode::Generate, Mode::Proba);
    let driver = Driver::new(generator, template, settings.runner.clone(), &settings.driver);
    println!("Running {} queries ({:?})", samples.len(), mode);
    let outcome = driver.run(adapter, samples, mode)?;
    print_outcome(&outcome);
    if !outcome.failed.is_empty() { std::process::exit(2); }
    Ok(())
}

/// Marks `started load_index` and `started load_retriever`. Only the local
/// strategy opens a LanceDB index; the others keep an encoder for reranking.
fn load_retriever(settings: &Settings, timings: &mut TimingLog) -> Result<Arc<dyn Retriever>> {
    timings.mark("started load_index");
    let index = match settings.retrieval.strategy {
        StrategyKind::Local => Some(LanceIndex::open(&settings.lance.uri, &settings.lance.index_table)?),
        StrategyKind::Hosted | StrategyKind::CachedResults => None,
    };
    timings.mark("started load_retriever");
    let encoder = get_default_encoder(&settings.embed)?;
    let retriever: Arc<dyn Retriever> = match (settings.retrieval.strategy, index) {
        (StrategyKind::Local, Some(index)) => Arc::new(LanceRetriever::new(index, encoder)),
        (StrategyKind::CachedResults, _) => {
            let path = settings.retrieval.precomputed_path.as_deref().context("retrieval.precomputed_path is not set")?;
            Arc::new(FlatRetriever::from_vectors(encoder, Vec::new()).load_precomputed(&ragqa_core::config::expand_path(path))?)
        }
        _ => Arc::new(FlatRetriever::from_vectors(encoder, Vec::new())),
    };
    Ok(retriever)
}

fn print_timings(title: &str, timings: &TimingLog) {
    println!("{}:", title);
    for (stage, secs) in timings.spans() { println!("  {:<24} {:>8.3}s", stage, secs); }
}

fn print_outcome(outcome: &DriverOutcome) {
    for r in &outcome.responses { println!("[{}] {} -> {}", r.id, r.question, r.response); }
    for r in &outcome.scores {
        let top: Vec<String> = r.scores.iter().map(|t| format!("{}={:.3}", t.token, t.probability)).collect();
        println!("[{}] {}", r.id, top.join(" "));
    }
    println!(
        "✅ {} succeeded, {} failed after {} attempt(s) in {:.2}s ({} cache hits)",
        outcome.succeeded(), outcome.failed.len(), outcome.attempts, outcome.elapsed.as_secs_f64(), outcome.cache_hits
    );
    for f in &outcome.failed { println!("❌ [{}] {}: {}", f.sample_id, f.query, f.error); }
    tracing::debug!(entries = outcome.timings.len(), "driver timing log");
}
