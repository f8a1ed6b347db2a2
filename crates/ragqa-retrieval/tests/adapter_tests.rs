mod common;

use std::sync::Arc;

use common::{collection, serve_once, FakeRetriever};
use ragqa_core::types::StrategyKind;
use ragqa_retrieval::hosted::parse_indices;
use ragqa_retrieval::{EmbeddingCache, HostedRetriever, RetrievalAdapter, RetrievalStrategy};

fn queries(q: &str) -> Vec<String> { vec![q.to_string()] }

#[test]
fn local_path_searches_db_k_then_serves_from_cache() {
    let retriever = Arc::new(FakeRetriever::with_results((0..30).collect()));
    let mut adapter = RetrievalAdapter::new(RetrievalStrategy::Local(EmbeddingCache::new(4, 1e-3)), retriever.clone(), Arc::new(collection(40)), 5, 20);

    let first = adapter.retrieve(&queries("what is haleys comet?")).unwrap();
    assert_eq!(first.strategy, StrategyKind::Local);
    assert!(!first.cache_hit);
    assert_eq!(first.indices[0].len(), 20, "over-fetches db_k");
    assert_eq!(retriever.searches(), 1);

    let second = adapter.retrieve(&queries("what is haleys comet?")).unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.indices, first.indices);
    assert_eq!(retriever.searches(), 1, "a cache hit performs no index search");
    assert_eq!(adapter.cache_hits(), 1);
    assert_eq!(adapter.cache().map(EmbeddingCache::len), Some(1));
}

#[test]
fn cached_results_path_maps_ids_to_indices() {
    let retriever = Arc::new(FakeRetriever { ids: vec!["doc4".into(), "doc0".into(), "doc2".into()], ..FakeRetriever::default() });
    let mut adapter = RetrievalAdapter::new(RetrievalStrategy::CachedResults, retriever.clone(), Arc::new(collection(5)), 2, 2);

    let r = adapter.retrieve(&queries("q")).unwrap();
    assert_eq!(r.strategy, StrategyKind::CachedResults);
    assert_eq!(r.indices, vec![vec![4, 0]]);
    assert_eq!(retriever.id_lookups(), 1);
    assert_eq!(retriever.searches(), 0);
    assert_eq!(retriever.encodes(), 0);
}

#[test]
fn hosted_path_keeps_service_order() {
    let (url, server) = serve_once("200 OK", r#"{"indices": [[3, 1, 2]], "distances": [[0.1, 0.2, 0.3]]}"#);
    let retriever = Arc::new(FakeRetriever::default());
    let hosted = HostedRetriever::new(&url, None).unwrap();
    let mut adapter = RetrievalAdapter::new(RetrievalStrategy::Hosted(hosted), retriever.clone(), Arc::new(collection(5)), 3, 3);

    let fetched = adapter.fetch(&queries("what is the plot of hamlet?")).unwrap();
    let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();

    assert_eq!(request["queries"][0], "what is the plot of hamlet?");
    assert_eq!(request["k"], 3);
    assert_eq!(request["dataset"], "wiki");
    assert_eq!(fetched.strategy, StrategyKind::Hosted);
    assert_eq!(fetched.indices, vec![vec![3, 1, 2]]);
    let titles: Vec<_> = fetched.passages[0].iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["p3", "p1", "p2"]);
    assert!(!fetched.reranked);
    assert_eq!(retriever.searches() + retriever.id_lookups() + retriever.encodes(), 0, "no local retrieval work");
}

#[test]
fn hosted_error_status_propagates() {
    let (url, server) = serve_once("503 Service Unavailable", r#"{"error": "busy"}"#);
    let hosted = HostedRetriever::new(&url, None).unwrap();
    let mut adapter = RetrievalAdapter::new(RetrievalStrategy::Hosted(hosted), Arc::new(FakeRetriever::default()), Arc::new(collection(5)), 3, 3);
    let err = adapter.retrieve(&queries("q")).unwrap_err();
    server.join().unwrap();
    assert!(err.to_string().contains("503"), "got: {err}");
}

#[test]
fn hosted_unreachable_endpoint_is_an_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/search", listener.local_addr().unwrap());
    drop(listener);
    let hosted = HostedRetriever::new(&url, Some(std::time::Duration::from_secs(5))).unwrap();
    assert!(hosted.search(&queries("q"), 3, "wiki").is_err());
}

#[test]
fn malformed_hosted_payloads_are_tolerated() {
    assert!(parse_indices(&serde_json::json!({"unexpected": true})).is_empty());
    assert_eq!(parse_indices(&serde_json::json!({"indices": [[1.0, 2.0], "x", [-1, 4]]})), vec![vec![1, 2], vec![], vec![4]]);
}

#[test]
fn fetch_reranks_when_over_fetching() {
    let mut retriever = FakeRetriever::with_results((0..6).collect());
    retriever.vectors.insert("q".into(), vec![0.0]);
    for (i, v) in [9.0f32, 1.0, 8.0, 2.0, 7.0, 3.0].iter().enumerate() { retriever.vectors.insert(format!("p{i} "), vec![*v]); }
    let retriever = Arc::new(retriever);
    let mut adapter = RetrievalAdapter::new(RetrievalStrategy::Local(EmbeddingCache::disabled()), retriever, Arc::new(collection(6)), 3, 6);

    let fetched = adapter.fetch(&queries("q")).unwrap();
    assert!(fetched.reranked);
    assert_eq!(fetched.indices, vec![vec![1, 3, 5]]);
    assert_eq!(fetched.passages[0].len(), 3);
}

#[test]
fn from_settings_builds_the_configured_strategy() {
    use ragqa_core::config::RetrievalSettings;

    let hosted_without_url = RetrievalSettings { strategy: StrategyKind::Hosted, hosted_url: None, ..RetrievalSettings::default() };
    assert!(RetrievalAdapter::from_settings(&hosted_without_url, Arc::new(FakeRetriever::default()), Arc::new(collection(3))).is_err());

    let local = RetrievalSettings { k: 2, db_k: 4, cache_depth: 7, ..RetrievalSettings::default() };
    let adapter = RetrievalAdapter::from_settings(&local, Arc::new(FakeRetriever::default()), Arc::new(collection(3))).unwrap();
    assert_eq!(adapter.kind(), StrategyKind::Local);
    assert_eq!((adapter.k(), adapter.db_k()), (2, 4));
    assert_eq!(adapter.cache().map(EmbeddingCache::capacity), Some(7));

    let hosted = RetrievalSettings { strategy: StrategyKind::Hosted, hosted_url: Some("http://127.0.0.1:9/search".into()), ..RetrievalSettings::default() };
    let adapter = RetrievalAdapter::from_settings(&hosted, Arc::new(FakeRetriever::default()), Arc::new(collection(3))).unwrap();
    assert_eq!(adapter.kind(), StrategyKind::Hosted);
    assert!(adapter.cache().is_none());
}
