use std::path::Path;

use crag_pipeline::dataset::{load_complaints, product_distribution, write_cleaned_csv};
use crag_pipeline::filter::{apply_cleaning, filter_complaints};
use crag_pipeline::sampling::Allocation;
use crag_pipeline::{
    chunk_records, stratified_sample, ChunkerConfig, FilterReport, NarrativeCleaner,
    SampleOptions, TextChunker,
};
use crag_vector::types::FLAT_IP;
use crag_vector::{ChunkMetadata, IndexConfig, VectorStore};

use crate::error::{EngineError, Result};
use crate::inference::embed_in_batches;
use crate::models::Embedder;

fn log_distribution(stage: &str, distribution: &[(String, usize)]) {
    for (product, count) in distribution {
        tracing::info!(stage, product = %product, count, "Product distribution");
    }
}

/// Load raw complaints, keep the target products, clean narratives and write
/// the cleaned CSV.
pub fn preprocess(input: &Path, output: &Path, allowed: &[String]) -> Result<FilterReport> {
    let records = load_complaints(input)?;

    let mut report = FilterReport::default();
    let records = filter_complaints(records, allowed, &mut report);
    if !report.unmapped.is_empty() {
        tracing::debug!(unmapped = ?report.unmapped, "Products without a category");
    }

    let cleaner = NarrativeCleaner::new()?;
    let records = apply_cleaning(records, &cleaner, &mut report);

    tracing::info!(
        input = report.input,
        unmapped_product = report.unmapped_product,
        excluded_product = report.excluded_product,
        empty_narrative = report.empty_narrative,
        empty_after_cleaning = report.empty_after_cleaning,
        kept = report.kept,
        "Filtering complete"
    );
    log_distribution("cleaned", &product_distribution(&records));

    write_cleaned_csv(output, &records)?;
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub sample: SampleOptions,
    pub chunker: ChunkerConfig,
    pub batch_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            sample: SampleOptions::default(),
            chunker: ChunkerConfig::default(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub records: usize,
    pub sampled: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub allocations: Vec<Allocation>,
}

/// Sample, chunk and embed a cleaned dataset, then persist the vector store
/// to `output_dir`.
pub fn build_index(
    input: &Path,
    output_dir: &Path,
    options: &BuildOptions,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    let chunker = TextChunker::new(options.chunker.clone())?;

    let mut records = load_complaints(input)?;
    let before = records.len();
    records.retain(|r| !r.text().trim().is_empty());
    if records.len() < before {
        tracing::warn!(dropped = before - records.len(), "Skipped rows with empty narratives");
    }
    if records.iter().any(|r| r.cleaned_narrative.is_empty()) {
        tracing::warn!("Some rows have no cleaned narrative; using the raw text for them");
    }

    let (sample, allocations) =
        stratified_sample(&records, |r| r.product_category.as_str(), &options.sample);
    for a in &allocations {
        tracing::info!(
            product = %a.category,
            available = a.available,
            quota = a.quota,
            take = a.take,
            "Sample allocation"
        );
    }

    let chunks = chunk_records(&sample, &chunker);
    if chunks.is_empty() {
        return Err(EngineError::EmptyInput(format!(
            "no chunks produced from {}",
            input.display()
        )));
    }
    tracing::info!(records = sample.len(), chunks = chunks.len(), "Chunking complete");

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_in_batches(embedder, &texts, options.batch_size)?;
    let dimension = vectors.first().map_or(0, Vec::len);

    let metadata: Vec<ChunkMetadata> = chunks
        .into_iter()
        .map(|c| ChunkMetadata {
            source_id: c.source_id,
            product_category: c.product_category,
            issue: c.issue,
            chunk_index: c.chunk_index,
            total_chunks: c.total_chunks,
            text: c.text,
        })
        .collect();

    let config = IndexConfig {
        embedding_model: embedder.name().to_string(),
        embedding_backend: embedder.backend().map(String::from),
        embedding_endpoint: embedder.endpoint().map(String::from),
        dimension,
        chunk_size: options.chunker.max_chunk_length,
        chunk_overlap: options.chunker.overlap_length,
        separators: options.chunker.separators.clone(),
        sample_size: sample.len(),
        seed: options.sample.seed,
        total_chunks: 0,
        index_type: FLAT_IP.to_string(),
    };
    let mut store = VectorStore::new(config)?;
    store.add(&vectors, metadata)?;
    store.save(output_dir)?;

    Ok(BuildReport {
        records: records.len(),
        sampled: sample.len(),
        chunks: store.len(),
        dimension,
        allocations,
    })
}
