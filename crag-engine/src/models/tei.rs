//! Embeddings from a Hugging Face Text Embeddings Inference server.

use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use ureq::Agent;

use super::{EmbedResult, Embedder, TEI_BACKEND};

#[derive(Debug, Clone)]
pub struct TeiConfig {
    /// Server root, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Name recorded in the index config; the server decides the actual model.
    pub model: String,
    pub timeout_secs: u64,
    /// Let the server cut inputs longer than the model accepts.
    pub truncate: bool,
}

impl Default for TeiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            model: "tei".to_string(),
            timeout_secs: 60,
            truncate: true,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    normalize: bool,
    truncate: bool,
}

/// `POST {base_url}/embed` client.
pub struct TeiEmbedder {
    endpoint: String,
    agent: Agent,
    config: TeiConfig,
}

impl TeiEmbedder {
    pub fn new(config: TeiConfig) -> Self {
        let agent = Agent::new_with_config(
            Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
                .build(),
        );
        Self {
            endpoint: embed_url(&config.base_url),
            agent,
            config,
        }
    }
}

fn embed_url(base_url: &str) -> String {
    format!("{}/embed", base_url.trim_end_matches('/'))
}

impl Embedder for TeiEmbedder {
    fn embed(&self, texts: &[String]) -> Result<EmbedResult> {
        if texts.is_empty() {
            return Ok(EmbedResult::default());
        }
        tracing::debug!(inputs = texts.len(), endpoint = %self.endpoint, "TEI embed request");

        let request = EmbedRequest {
            inputs: texts,
            normalize: true,
            truncate: self.config.truncate,
        };
        let embeddings: Vec<Vec<f32>> = self
            .agent
            .post(&self.endpoint)
            .send_json(&request)
            .with_context(|| format!("TEI request to {} failed", self.endpoint))?
            .body_mut()
            .read_json()
            .context("TEI returned a body that is not a list of vectors")?;
        ensure!(
            embeddings.len() == texts.len(),
            "TEI returned {} vectors for {} inputs",
            embeddings.len(),
            texts.len()
        );

        // TEI does not report usage; four characters per token is close enough for logs.
        let prompt_tokens = texts.iter().map(|t| (t.len() / 4) as u64).sum();
        Ok(EmbedResult {
            embeddings,
            prompt_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.config.model
    }

    fn backend(&self) -> Option<&str> {
        Some(TEI_BACKEND)
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.config.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_embed_url() {
        assert_eq!(embed_url("http://localhost:8080/"), "http://localhost:8080/embed");
        assert_eq!(embed_url("http://tei:80"), "http://tei:80/embed");
    }

    #[test]
    fn request_body_shape() {
        let inputs = vec!["a".to_string()];
        let body = EmbedRequest { inputs: &inputs, normalize: true, truncate: false };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"inputs": ["a"], "normalize": true, "truncate": false})
        );
    }

    #[test]
    fn reports_configured_model_name() {
        let embedder = TeiEmbedder::new(TeiConfig { model: "bge-small".into(), ..TeiConfig::default() });
        assert_eq!(embedder.name(), "bge-small");
        assert_eq!(embedder.backend(), Some("tei"));
        assert_eq!(embedder.endpoint(), Some("http://localhost:8080"));
        assert!(embedder.embed(&[]).unwrap().embeddings.is_empty());
    }
}
