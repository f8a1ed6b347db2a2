#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::bail;
use ragqa_core::prompt::QaTemplate;
use ragqa_core::traits::{Generator, QueryEncoder, Retriever};
use ragqa_core::types::{DocIndex, Embedding, Passage, TokenProbability};
use ragqa_core::InMemoryCollection;
use ragqa_generation::FakeGenerator;
use ragqa_runner::RunnerComponents;

/// Encodes each query as `[len]` and always returns `results`.
#[derive(Default)]
pub struct StubRetriever {
    pub results: Vec<DocIndex>,
    pub encode_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl StubRetriever {
    pub fn with_results(results: Vec<DocIndex>) -> Self { Self { results, ..Self::default() } }
    pub fn encodes(&self) -> usize { self.encode_calls.load(Ordering::SeqCst) }
    pub fn searches(&self) -> usize { self.search_calls.load(Ordering::SeqCst) }
}

impl QueryEncoder for StubRetriever {
    fn dim(&self) -> usize { 1 }
    fn encode_queries(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
    }
}

impl Retriever for StubRetriever {
    fn search(&self, embeddings: &[Embedding], k: usize) -> anyhow::Result<Vec<Vec<DocIndex>>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(embeddings.iter().map(|_| self.results.iter().copied().take(k).collect()).collect())
    }
}

/// Echoes nothing useful; fails for prompts containing `fail_on` and keeps every prompt it saw.
pub struct RecordingGenerator {
    pub fail_on: Option<&'static str>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(fail_on: Option<&'static str>) -> Self { Self { fail_on, prompts: Mutex::new(Vec::new()) } }
    pub fn seen(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

impl Generator for RecordingGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(marker) = self.fail_on {
            if prompt.contains(marker) { bail!("generator rejected prompt"); }
        }
        Ok(" B ".to_string())
    }

    fn score(&self, prompt: &str, k: usize) -> anyhow::Result<Vec<TokenProbability>> {
        self.generate(prompt)?;
        FakeGenerator::default().score(prompt, k)
    }
}

pub fn components(generator: Arc<dyn Generator>) -> RunnerComponents {
    RunnerComponents { generator, template: Arc::new(QaTemplate) }
}

/// Passages `p0..p{n-1}` with ids `doc{i}` and text `text {i}`.
pub fn collection(n: usize) -> InMemoryCollection {
    InMemoryCollection::new("wiki", (0..n).map(|i| Passage::new(format!("doc{i}"), format!("p{i}"), format!("text {i}"))).collect())
}

/// Answer exactly one HTTP request with `body`; the handle yields the request body.
pub fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/search", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(p) = buf.windows(4).position(|w| w == b"\r\n\r\n") { break p + 4; }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let len = headers.lines().find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())).unwrap_or(0);
        while buf.len() < header_end + len {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 { break; }
            buf.extend_from_slice(&chunk[..n]);
        }
        let response = format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", body.len(), body);
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&buf[header_end..header_end + len]).to_string()
    });
    (url, handle)
}
