#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use ragqa_core::traits::{QueryEncoder, Retriever};
use ragqa_core::types::{DocIndex, Embedding, Passage};
use ragqa_core::InMemoryCollection;

/// One-dimensional encoder: known texts map to fixed values, anything else to its length.
#[derive(Default)]
pub struct FakeRetriever {
    pub vectors: HashMap<String, Embedding>,
    pub results: Vec<DocIndex>,
    pub ids: Vec<String>,
    pub encode_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub ids_calls: AtomicUsize,
}

impl FakeRetriever {
    pub fn with_results(results: Vec<DocIndex>) -> Self { Self { results, ..Self::default() } }
    pub fn encodes(&self) -> usize { self.encode_calls.load(Ordering::SeqCst) }
    pub fn searches(&self) -> usize { self.search_calls.load(Ordering::SeqCst) }
    pub fn id_lookups(&self) -> usize { self.ids_calls.load(Ordering::SeqCst) }
}

impl QueryEncoder for FakeRetriever {
    fn dim(&self) -> usize { 1 }
    fn encode_queries(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![t.len() as f32])).collect())
    }
}

impl Retriever for FakeRetriever {
    fn search(&self, embeddings: &[Embedding], k: usize) -> anyhow::Result<Vec<Vec<DocIndex>>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(embeddings.iter().map(|_| self.results.iter().copied().take(k).collect()).collect())
    }
    fn retrieve_ids(&self, queries: &[String], k: usize) -> anyhow::Result<Vec<Vec<String>>> {
        self.ids_calls.fetch_add(1, Ordering::SeqCst);
        Ok(queries.iter().map(|_| self.ids.iter().take(k).cloned().collect()).collect())
    }
}

/// Passages `p0..p{n-1}` with ids `doc{i}`.
pub fn collection(n: usize) -> InMemoryCollection {
    InMemoryCollection::new("wiki", (0..n).map(|i| Passage::new(format!("doc{i}"), format!("p{i}"), "")).collect())
}

/// Answer exactly one HTTP request with `status` and `body`; the handle yields the request body.
pub fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
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
        let request_body = String::from_utf8_lossy(&buf[header_end..header_end + len]).to_string();
        let response = format!("HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", status, body.len(), body);
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request_body
    });
    (url, handle)
}
