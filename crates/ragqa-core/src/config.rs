use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::StrategyKind;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."), None)
    }

    /// Merge `config.toml`, `config.<env>.toml` and `APP_*` variables found
    /// relative to `base`. `env_name` overrides `RUST_ENV`.
    pub fn load_from(base: &Path, env_name: Option<&str>) -> anyhow::Result<Self> {
        let env_name = env_name.map(str::to_string).unwrap_or_else(|| env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()));

        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                let settings = self.settings()?;
                if settings.runner.output_path.is_none() {
                    return Err(Error::InvalidConfig("runner.output_path must be set in production".into()).into());
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub runner: RunnerSettings,
    pub generator: GeneratorSettings,
    pub embed: EmbedSettings,
    pub lance: LanceSettings,
    pub driver: DriverSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let r = &self.retrieval;
        if r.k == 0 {
            return Err(Error::InvalidConfig("retrieval.k must be > 0".into()));
        }
        if r.db_k < r.k {
            return Err(Error::InvalidConfig(format!("retrieval.db_k ({}) must be >= retrieval.k ({})", r.db_k, r.k)));
        }
        if r.strategy == StrategyKind::Hosted && r.hosted_url.as_deref().map_or(true, str::is_empty) {
            return Err(Error::InvalidConfig("retrieval.hosted_url is required for the hosted strategy".into()));
        }
        if r.strategy == StrategyKind::CachedResults && r.precomputed_path.as_deref().map_or(true, str::is_empty) {
            return Err(Error::InvalidConfig("retrieval.precomputed_path is required for the cached_results strategy".into()));
        }
        if r.cache_max_distance.is_nan() || r.cache_max_distance < 0.0 {
            return Err(Error::InvalidConfig("retrieval.cache_max_distance must be a non-negative number".into()));
        }
        if self.embed.max_len == 0 {
            return Err(Error::InvalidConfig("embed.max_len must be > 0".into()));
        }
        if self.runner.logging_interval == 0 {
            return Err(Error::InvalidConfig("runner.logging_interval must be > 0".into()));
        }
        if self.driver.max_attempts == 0 {
            return Err(Error::InvalidConfig("driver.max_attempts must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub strategy: StrategyKind,
    pub k: usize,
    pub db_k: usize,
    pub cache_depth: usize,
    pub cache_max_distance: f32,
    pub hosted_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// JSON object of query text -> collection ids, for `cached_results`.
    pub precomputed_path: Option<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { strategy: StrategyKind::Local, k: 10, db_k: 10, cache_depth: 128, cache_max_distance: 1e-3, hosted_url: None, timeout_secs: None, precomputed_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub use_rag: bool,
    /// Recorded only: generation always runs one query per call.
    pub batch_size: usize,
    pub logging_interval: usize,
    pub output_path: Option<String>,
    pub post_process_response: bool,
    pub template: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { use_rag: true, batch_size: 1, logging_interval: 256, output_path: None, post_process_response: false, template: "qa".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub endpoint: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self { endpoint: None, model: "flan-t5-xxl".to_string(), max_tokens: 32, temperature: 0.0, api_key_env: None, timeout_secs: None }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolingKind {
    Cls,
    Mean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub pooling: PoolingKind,
    /// Tensor name prefix inside the checkpoint (e.g. `question_encoder.bert_model`).
    pub weights_prefix: Option<String>,
    /// Dimension of the fake encoder.
    pub dim: usize,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self { model_dir: None, max_len: 256, pooling: PoolingKind::Cls, weights_prefix: None, dim: 768 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanceSettings {
    pub uri: String,
    pub index_table: String,
    pub collection_table: String,
    /// Name reported to hosted retrievers; defaults to the collection table.
    pub collection_name: Option<String>,
}

impl Default for LanceSettings {
    fn default() -> Self {
        Self { uri: "data/lancedb".to_string(), index_table: "passages".to_string(), collection_table: "passages".to_string(), collection_name: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub max_attempts: usize,
    pub wait_for_enter: bool,
}

impl Default for DriverSettings {
    fn default() -> Self { Self { max_attempts: 3, wait_for_enter: false } }
}

/// `~` and `$VAR`/`${VAR}` expansion; the result is not canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
