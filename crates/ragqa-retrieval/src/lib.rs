//! ragqa-retrieval
//!
//! Retrieval side of the pipeline: the embedding-keyed result cache, the
//! three retrieval strategies behind [`RetrievalAdapter`], the distance
//! rerank, and the in-memory and LanceDB-backed retrievers/collections.

pub mod adapter;
pub mod cache;
pub mod flat;
pub mod hosted;
pub mod lance;
pub mod rerank;

pub use adapter::{Fetched, Retrieval, RetrievalAdapter, RetrievalStrategy};
pub use cache::EmbeddingCache;
pub use flat::FlatRetriever;
pub use hosted::HostedRetriever;
pub use lance::{LanceCollection, LanceIndex, LanceRetriever};
