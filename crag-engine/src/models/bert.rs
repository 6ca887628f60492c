use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::weights::{ModelFiles, ModelSource};
use super::{EmbedResult, Embedder, BERT_BACKEND};

/// MiniLM-class models are trained on sequences up to this length.
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Local sentence-embedding model via Candle.
///
/// Mean-pools the last hidden state over the attention mask and
/// L2-normalises the result.
pub struct BertEmbedder {
    name: String,
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    /// Load from a HuggingFace repo id or a local model directory.
    pub fn load(model_id: &str, revision: Option<&str>, device: &Device) -> Result<Self> {
        let files = ModelSource::from_id(model_id, revision).resolve()?;
        Self::from_files(model_id, &files, device)
    }

    /// Load from resolved file paths.
    pub fn from_files(name: &str, files: &ModelFiles, device: &Device) -> Result<Self> {
        tracing::info!(
            config = %files.config.display(),
            weights = %files.weights.display(),
            "Loading embedding model"
        );

        let config_str = std::fs::read_to_string(&files.config)?;
        let config: Config = serde_json::from_str(&config_str)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to set truncation: {}", e))?;

        // SAFETY: the safetensors file comes from the Hub cache or a local model
        // directory and is not modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, device)?
        };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            name: name.to_string(),
            model,
            tokenizer,
            device: device.clone(),
        })
    }
}

impl Embedder for BertEmbedder {
    fn embed(&self, texts: &[String]) -> Result<EmbedResult> {
        if texts.is_empty() {
            return Ok(EmbedResult::default());
        }

        tracing::debug!(batch_size = texts.len(), "Encoding batch for embeddings");

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenizer batch encode error: {}", e))?;

        let batch_size = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut token_ids: Vec<u32> = Vec::with_capacity(batch_size * seq_len);
        let mut type_ids: Vec<u32> = Vec::with_capacity(batch_size * seq_len);
        let mut mask: Vec<f32> = Vec::with_capacity(batch_size * seq_len);
        let mut total_tokens: u64 = 0;

        for encoding in &encodings {
            let ids = encoding.get_ids();
            total_tokens += encoding.get_attention_mask().iter().filter(|&&m| m == 1).count() as u64;

            token_ids.extend_from_slice(ids);
            token_ids.resize(token_ids.len() + seq_len - ids.len(), 0);

            let types = encoding.get_type_ids();
            type_ids.extend_from_slice(types);
            type_ids.resize(type_ids.len() + seq_len - types.len(), 0);

            let attention = encoding.get_attention_mask();
            mask.extend(attention.iter().map(|&m| m as f32));
            mask.resize(mask.len() + seq_len - attention.len(), 0.0);
        }

        let token_ids = Tensor::from_vec(token_ids, (batch_size, seq_len), &self.device)?;
        let type_ids = Tensor::from_vec(type_ids, (batch_size, seq_len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (batch_size, seq_len), &self.device)?;

        let output = self
            .model
            .forward(&token_ids, &type_ids, Some(&attention_mask))?;

        // Mean pooling with attention mask
        let mask_expanded = attention_mask.unsqueeze(2)?.broadcast_as(output.shape())?;
        let summed = output.mul(&mask_expanded)?.sum(1)?;
        let counts = attention_mask.sum(1)?.unsqueeze(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        let embeddings: Vec<Vec<f32>> = normalized
            .to_dtype(DType::F32)?
            .to_device(&Device::Cpu)?
            .to_vec2()?;

        tracing::debug!(
            batch_size,
            total_tokens,
            embedding_dim = embeddings.first().map_or(0, |e| e.len()),
            "Embeddings generated"
        );

        Ok(EmbedResult {
            embeddings,
            prompt_tokens: total_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> Option<&str> {
        Some(BERT_BACKEND)
    }
}
