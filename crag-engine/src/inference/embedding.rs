use crate::error::{EngineError, Result};
use crate::models::Embedder;

/// Embed `texts` in input order, `batch_size` at a time.
///
/// Every batch must return one vector per text, and every vector must share
/// the dimension of the first one. Any backend failure is fatal.
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(EngineError::InvalidArgument("batch size must be greater than 0".into()));
    }

    let total_batches = texts.len().div_ceil(batch_size);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    let mut dimension: Option<usize> = None;
    let mut prompt_tokens: u64 = 0;

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        let result = embedder
            .embed(batch)
            .map_err(|e| EngineError::Inference(format!("{e:#}")))?;

        if result.embeddings.len() != batch.len() {
            return Err(EngineError::EmbeddingCount {
                sent: batch.len(),
                received: result.embeddings.len(),
            });
        }
        for v in &result.embeddings {
            let expected = *dimension.get_or_insert(v.len());
            if v.len() != expected || expected == 0 {
                return Err(EngineError::DimensionDrift {
                    expected,
                    actual: v.len(),
                });
            }
        }

        prompt_tokens += result.prompt_tokens;
        vectors.extend(result.embeddings);
        tracing::debug!(batch = i + 1, total_batches, embedded = vectors.len(), "Embedded batch");
        if (i + 1) % 50 == 0 {
            tracing::info!(batch = i + 1, total_batches, "Embedding progress");
        }
    }

    tracing::info!(
        texts = texts.len(),
        dimension = dimension.unwrap_or(0),
        prompt_tokens,
        "Embedding complete"
    );
    Ok(vectors)
}
