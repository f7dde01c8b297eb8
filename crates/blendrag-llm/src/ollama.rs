use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use blendrag_core::config::LlmConfig;
use blendrag_core::traits::Generator;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 400;

/// Non-streaming completions from a local Ollama server (`POST /api/generate`).
#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.status().is_some_and(|s| s.is_server_error())
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            bail!("Ollama base URL is required");
        }
        let client = Client::builder().timeout(timeout).build().context("building HTTP client")?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), model: model.into() })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        debug!(base_url = %config.base_url, model = %config.model, "creating OllamaGenerator");
        Self::new(config.base_url.clone(), config.model.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn model(&self) -> &str { &self.model }

    /// Sends the request, retrying connection failures, timeouts and 5xx
    /// responses with exponential backoff (100ms, 200ms, 400ms).
    async fn send_with_retry(&self, body: &GenerateRequest<'_>) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 0;
        loop {
            let result = match self.client.post(&url).json(body).send().await {
                Ok(resp) => resp.error_for_status(),
                Err(e) => Err(e),
            };
            match result {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) && attempt < MAX_RETRIES => {
                    let backoff_ms = (INITIAL_BACKOFF_MS * 2_u64.pow(attempt)).min(MAX_BACKOFF_MS);
                    warn!(attempt = attempt + 1, max = MAX_RETRIES, backoff_ms, "transient Ollama error, retrying: {err}");
                    sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { num_predict: max_tokens, temperature },
        };
        let response = self.send_with_retry(&body).await.map_err(|e| {
            error!("Ollama request failed after retries: {e}");
            anyhow!("Ollama request failed: {e}")
        })?;
        let parsed: GenerateResponse = response.json().await.context("parsing Ollama response")?;
        debug!(chars = parsed.response.len(), "generation complete");
        Ok(parsed.response)
    }
}
