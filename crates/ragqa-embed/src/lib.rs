//! Query encoders.
//!
//! [`BertQueryEncoder`] runs a BERT/DPR question encoder with candle.
//! Setting `APP_USE_FAKE_EMBEDDINGS=1` swaps in [`FakeEncoder`], which is
//! deterministic and needs no model files.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use ragqa_core::config::{EmbedSettings, PoolingKind};
use ragqa_core::traits::QueryEncoder;
use ragqa_core::types::Embedding;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::{cls_pool, masked_mean_l2};
pub use tokenize::tokenize_batch;

pub struct BertQueryEncoder {
    model: Mutex<BertModel>,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
    pooling: PoolingKind,
}

impl BertQueryEncoder {
    pub fn load(settings: &EmbedSettings) -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
        tracing::info!(model_dir = %model_dir.display(), "loading query encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let meta: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = meta.get("hidden_size").and_then(serde_json::Value::as_u64).ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let pad_id = meta.get("pad_token_id").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let vb = match settings.weights_prefix.as_deref() { Some(p) if !p.is_empty() => vb.pp(p), _ => vb };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim, pooling = ?settings.pooling, "query encoder loaded");
        Ok(Self { model: Mutex::new(model), tokenizer, device, dim, max_len: settings.max_len, pad_id, pooling: settings.pooling })
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = {
            let model = self.model.lock().map_err(|_| anyhow!("encoder mutex poisoned"))?;
            model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?
        };
        let pooled = match self.pooling {
            PoolingKind::Cls => cls_pool(&hidden)?,
            PoolingKind::Mean => masked_mean_l2(&hidden, &attention_mask)?,
        };
        let rows: Vec<Vec<f32>> = pooled.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec2()?;
        if start.elapsed().as_millis() > 100 { tracing::debug!(texts = texts.len(), ms = start.elapsed().as_millis() as u64, "slow encode"); }
        Ok(rows)
    }
}

impl QueryEncoder for BertQueryEncoder {
    fn dim(&self) -> usize { self.dim }
    fn encode_queries(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        self.encode_batch(texts)
    }
}

/// Hashes whitespace tokens into buckets and L2-normalizes. Same text, same vector.
pub struct FakeEncoder { dim: usize }

impl FakeEncoder { pub fn new(dim: usize) -> Self { Self { dim } } }

impl FakeEncoder {
    fn embed_text(&self, text: &str) -> Embedding {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        if self.dim == 0 { return Vec::new(); }
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; }
        v
    }
}

impl QueryEncoder for FakeEncoder {
    fn dim(&self) -> usize { self.dim }
    fn encode_queries(&self, texts: &[String]) -> Result<Vec<Embedding>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_encoder(settings: &EmbedSettings) -> Result<Box<dyn QueryEncoder>> {
    if use_fake_embeddings() { tracing::info!(dim = settings.dim, "using FakeEncoder"); return Ok(Box::new(FakeEncoder::new(settings.dim))); }
    Ok(Box::new(BertQueryEncoder::load(settings)?))
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<std::collections::HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() { return Ok(candle_core::safetensors::load(&safetensors, device)?); }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin under {}", model_dir.display()))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = ragqa_core::config::expand_path(dir); if p.exists() { return Ok(p); } return Err(anyhow!("Configured embed.model_dir does not exist: {}", p.display())); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    let default = Path::new("models/dpr-question_encoder-multiset-base"); if default.exists() { return Ok(default.to_path_buf()); }
    Err(anyhow!("Could not locate query encoder model directory"))
}
