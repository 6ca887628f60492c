pub mod bert;
pub mod openai;
pub mod tei;
pub mod weights;

use anyhow::Result;

// ── Traits ────────────────────────────────────────────────────────────────

/// Trait for embedding models.
pub trait Embedder: Send {
    /// Generate embeddings for a batch of texts, one vector per text in input order.
    fn embed(&self, texts: &[String]) -> Result<EmbedResult>;

    /// Model identifier recorded in the index config.
    fn name(&self) -> &str;

    /// Backend kind recorded with an index so queries can rebuild the same embedder.
    fn backend(&self) -> Option<&str> {
        None
    }

    /// Server URL for HTTP backends.
    fn endpoint(&self) -> Option<&str> {
        None
    }
}

pub const BERT_BACKEND: &str = "bert";
pub const TEI_BACKEND: &str = "tei";
pub const OPENAI_BACKEND: &str = "openai";

/// Trait for text generation backends.
pub trait Generator: Send {
    /// Generate a completion for `prompt`, optionally preceded by a system message.
    fn generate(&self, system: Option<&str>, prompt: &str) -> Result<GenerationResult>;
}

// ── Result types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EmbedResult {
    pub embeddings: Vec<Vec<f32>>,
    pub prompt_tokens: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

// ── Generation parameters ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Default local sentence-embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
