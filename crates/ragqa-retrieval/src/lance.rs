//! LanceDB-backed retriever and document collection.
//!
//! Both read an existing table; building the table and its vector index is
//! out of scope. Expected columns: `idx` (integer position), `id`, `title`,
//! `text`, and `vector` for the retriever.
//!
//! LanceDB is async; the sync collaborator traits are served by blocking on a
//! runtime owned by each adapter.
use anyhow::{Result, anyhow};
use arrow_array::{Array, Int32Array, Int64Array, RecordBatch, StringArray, UInt32Array, UInt64Array};
use arrow_schema::DataType;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Table};
use tokio::runtime::Runtime;

use ragqa_core::traits::{QueryEncoder, Retriever};
use ragqa_core::types::{DocIndex, Embedding, Passage};
use ragqa_core::InMemoryCollection;

/// An opened LanceDB table with a vector column and an `idx` column.
pub struct LanceIndex {
    rt: Runtime,
    table: Table,
}

impl LanceIndex {
    pub fn open(uri: &str, table_name: &str) -> Result<Self> {
        let rt = Runtime::new()?;
        let table = rt.block_on(open_table(uri, table_name))?;
        tracing::info!(uri, table = table_name, "opened LanceDB index");
        Ok(Self { rt, table })
    }

    pub fn search(&self, q_vec: &[f32], k: usize) -> Result<Vec<DocIndex>> {
        let hits = self.rt.block_on(async {
            let mut stream = self.table.vector_search(q_vec.to_vec())?.limit(k).execute().await?;
            let mut hits = Vec::new();
            while let Some(batch) = TryStreamExt::try_next(&mut stream).await? { hits.extend(index_column(&batch, "idx")?); }
            Ok::<_, anyhow::Error>(hits)
        })?;
        Ok(hits.into_iter().take(k).collect())
    }
}

pub struct LanceRetriever {
    index: LanceIndex,
    encoder: Box<dyn QueryEncoder>,
}

impl LanceRetriever {
    pub fn new(index: LanceIndex, encoder: Box<dyn QueryEncoder>) -> Self { Self { index, encoder } }

    pub fn open(uri: &str, table_name: &str, encoder: Box<dyn QueryEncoder>) -> Result<Self> {
        Ok(Self::new(LanceIndex::open(uri, table_name)?, encoder))
    }
}

impl QueryEncoder for LanceRetriever {
    fn dim(&self) -> usize { self.encoder.dim() }
    fn encode_queries(&self, texts: &[String]) -> Result<Vec<Embedding>> { self.encoder.encode_queries(texts) }
}

impl Retriever for LanceRetriever {
    fn search(&self, embeddings: &[Embedding], k: usize) -> Result<Vec<Vec<DocIndex>>> {
        embeddings.iter().map(|q_vec| self.index.search(q_vec, k)).collect()
    }
}

/// Loads every row of `table_name` into an [`InMemoryCollection`] ordered by `idx`.
pub struct LanceCollection;

impl LanceCollection {
    pub fn load(uri: &str, table_name: &str, name: &str) -> Result<InMemoryCollection> {
        let rt = Runtime::new()?;
        let rows = rt.block_on(async {
            let table = open_table(uri, table_name).await?;
            let mut stream = table.query().execute().await?;
            let mut rows: Vec<(DocIndex, Passage)> = Vec::new();
            while let Some(batch) = TryStreamExt::try_next(&mut stream).await? {
                let idx = index_column(&batch, "idx")?;
                let ids = string_column(&batch, "id")?;
                let titles = string_column(&batch, "title")?;
                let texts = string_column(&batch, "text")?;
                for i in 0..batch.num_rows() {
                    rows.push((idx[i], Passage::new(ids.value(i), titles.value(i), texts.value(i))));
                }
            }
            Ok::<_, anyhow::Error>(rows)
        })?;
        collection_from_rows(name, rows)
    }
}

/// Orders rows by `idx`; positions must be exactly `0..n`.
pub fn collection_from_rows(name: &str, mut rows: Vec<(DocIndex, Passage)>) -> Result<InMemoryCollection> {
    rows.sort_by_key(|(i, _)| *i);
    if let Some(pos) = rows.iter().enumerate().position(|(pos, (i, _))| pos != *i) {
        return Err(anyhow!("collection '{}' is not densely indexed: expected idx {} but found {}", name, pos, rows[pos].0));
    }
    tracing::info!(name, passages = rows.len(), "collection loaded");
    Ok(InMemoryCollection::new(name, rows.into_iter().map(|(_, p)| p).collect()))
}

async fn open_table(uri: &str, table_name: &str) -> Result<Table> {
    let db = connect(uri).execute().await?;
    Ok(db.open_table(table_name).execute().await?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("missing or non-utf8 column '{}'", name))
}

fn index_column(batch: &RecordBatch, name: &str) -> Result<Vec<DocIndex>> {
    let col = batch.column_by_name(name).ok_or_else(|| anyhow!("missing column '{}'", name))?;
    let any = col.as_any();
    let values: Vec<i128> = match col.data_type() {
        DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| a.values().iter().map(|&v| v as i128).collect()),
        DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| a.values().iter().map(|&v| v as i128).collect()),
        DataType::UInt64 => any.downcast_ref::<UInt64Array>().map(|a| a.values().iter().map(|&v| v as i128).collect()),
        DataType::UInt32 => any.downcast_ref::<UInt32Array>().map(|a| a.values().iter().map(|&v| v as i128).collect()),
        other => return Err(anyhow!("column '{}' has unsupported type {}", name, other)),
    }
    .ok_or_else(|| anyhow!("column '{}' could not be read", name))?;
    values.into_iter().map(|v| DocIndex::try_from(v).map_err(|_| anyhow!("negative or oversized index {} in '{}'", v, name))).collect()
}
