//! OpenAI-compatible HTTP backends: `/embeddings` and `/chat/completions`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ureq::Agent;

use super::{
    EmbedResult, Embedder, GenerationParams, GenerationResult, Generator, OPENAI_BACKEND,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings shared by the OpenAI backends.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn agent(&self) -> Agent {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(self.timeout_secs)))
            .build();
        Agent::new_with_config(config)
    }

    /// The hosted API needs a key; self-hosted compatible servers may not.
    fn check_key(&self) -> Result<()> {
        let missing = self.api_key.as_deref().map_or(true, |k| k.trim().is_empty());
        if missing && self.base_url.trim_end_matches('/') == DEFAULT_BASE_URL {
            anyhow::bail!("OPENAI_API_KEY is required for {}", DEFAULT_BASE_URL);
        }
        Ok(())
    }

    fn post(&self, agent: &Agent, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        let request = agent.post(url);
        match self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }
}

// ── Embeddings ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    url: String,
    agent: Agent,
    model: String,
    config: OpenAiConfig,
}

impl OpenAiEmbedder {
    pub fn new(model: &str, config: OpenAiConfig) -> Result<Self> {
        config.check_key()?;
        Ok(Self {
            url: config.endpoint("embeddings"),
            agent: config.agent(),
            model: model.to_string(),
            config,
        })
    }
}

/// Reorder response rows by their `index` field.
fn ordered_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, texts: &[String]) -> Result<EmbedResult> {
        if texts.is_empty() {
            return Ok(EmbedResult::default());
        }
        tracing::debug!(batch_size = texts.len(), model = %self.model, "Requesting embeddings");

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = self
            .config
            .post(&self.agent, &self.url)
            .send_json(&body)
            .with_context(|| format!("Embedding request to {} failed", self.url))?
            .body_mut()
            .read_json()
            .context("Embedding response parse error")?;

        Ok(EmbedResult {
            embeddings: ordered_embeddings(response.data),
            prompt_tokens: response.usage.unwrap_or_default().prompt_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn backend(&self) -> Option<&str> {
        Some(OPENAI_BACKEND)
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.config.base_url)
    }
}

// ── Chat completions ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    url: String,
    agent: Agent,
    params: GenerationParams,
    config: OpenAiConfig,
}

impl OpenAiChat {
    pub fn new(params: GenerationParams, config: OpenAiConfig) -> Result<Self> {
        config.check_key()?;
        Ok(Self {
            url: config.endpoint("chat/completions"),
            agent: config.agent(),
            params,
            config,
        })
    }

    fn request<'a>(&'a self, system: Option<&'a str>, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });
        ChatRequest {
            model: &self.params.model,
            messages,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        }
    }
}

impl Generator for OpenAiChat {
    fn generate(&self, system: Option<&str>, prompt: &str) -> Result<GenerationResult> {
        tracing::debug!(model = %self.params.model, prompt_chars = prompt.len(), "Requesting completion");

        let response: ChatResponse = self
            .config
            .post(&self.agent, &self.url)
            .send_json(&self.request(system, prompt))
            .with_context(|| format!("Chat request to {} failed", self.url))?
            .body_mut()
            .read_json()
            .context("Chat response parse error")?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no message content"))?;
        let usage = response.usage.unwrap_or_default();

        Ok(GenerationResult {
            text: text.trim().to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}
