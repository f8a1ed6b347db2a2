//! Text generators.
//!
//! [`OpenAiGenerator`] talks to any OpenAI-compatible `/completions`
//! endpoint. `APP_USE_FAKE_GENERATOR=1` selects [`FakeGenerator`] instead.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use ragqa_core::config::GeneratorSettings;
use ragqa_core::traits::Generator;
use ragqa_core::types::TokenProbability;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    logprobs: Option<Logprobs>,
}

#[derive(Debug, Deserialize)]
struct Logprobs {
    #[serde(default)]
    top_logprobs: Vec<HashMap<String, f32>>,
}

pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self> {
        let url = settings.endpoint.clone().filter(|u| !u.is_empty()).ok_or_else(|| anyhow!("generator.endpoint is not configured"))?;
        let api_key = match settings.api_key_env.as_deref() {
            Some(var) => Some(std::env::var(var).with_context(|| format!("generator.api_key_env names '{}' but it is not set", var))?),
            None => None,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout_secs.map(Duration::from_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url, model: settings.model.clone(), max_tokens: settings.max_tokens, temperature: settings.temperature, api_key })
    }

    fn complete(&self, request: &CompletionRequest<'_>) -> Result<Choice> {
        let mut req = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }
        let resp = req.send().with_context(|| format!("Completion request to {} failed", self.url))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            bail!("Completion endpoint returned {}: {}", status, body);
        }
        let parsed: CompletionResponse = resp.json().context("Failed to parse completion response")?;
        parsed.choices.into_iter().next().ok_or_else(|| anyhow!("completion response has no choices"))
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest { model: &self.model, prompt, max_tokens: self.max_tokens, temperature: self.temperature, logprobs: None };
        Ok(self.complete(&request)?.text)
    }

    fn score(&self, prompt: &str, k: usize) -> Result<Vec<TokenProbability>> {
        let request = CompletionRequest { model: &self.model, prompt, max_tokens: 1, temperature: 0.0, logprobs: Some(k) };
        let choice = self.complete(&request)?;
        let top = choice
            .logprobs
            .and_then(|l| l.top_logprobs.into_iter().next())
            .ok_or_else(|| anyhow!("completion response carries no top_logprobs"))?;
        Ok(top_k_probabilities(top, k))
    }
}

/// Convert `token -> logprob` into the `k` most probable tokens.
pub fn top_k_probabilities(logprobs: HashMap<String, f32>, k: usize) -> Vec<TokenProbability> {
    let mut out: Vec<TokenProbability> = logprobs.into_iter().map(|(token, lp)| TokenProbability { token, probability: lp.exp() }).collect();
    out.sort_by(|a, b| b.probability.total_cmp(&a.probability).then_with(|| a.token.cmp(&b.token)));
    out.truncate(k);
    out
}

/// Canned responses for tests and dry runs.
pub struct FakeGenerator {
    response: String,
}

impl FakeGenerator {
    pub fn new(response: impl Into<String>) -> Self { Self { response: response.into() } }
}

impl Default for FakeGenerator {
    fn default() -> Self { Self::new(" A") }
}

impl Generator for FakeGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> { Ok(self.response.clone()) }

    fn score(&self, _prompt: &str, k: usize) -> Result<Vec<TokenProbability>> {
        let options = ["A", "B", "C", "D"];
        Ok(options.iter().take(k).map(|t| TokenProbability { token: (*t).to_string(), probability: 1.0 / options.len() as f32 }).collect())
    }
}

pub fn use_fake_generator() -> bool {
    std::env::var("APP_USE_FAKE_GENERATOR").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn load_generator(settings: &GeneratorSettings) -> Result<Box<dyn Generator>> {
    if use_fake_generator() { tracing::info!("using FakeGenerator"); return Ok(Box::new(FakeGenerator::default())); }
    tracing::info!(model = %settings.model, "using OpenAI-compatible generator");
    Ok(Box::new(OpenAiGenerator::new(settings)?))
}
