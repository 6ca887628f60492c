use serde::{Deserialize, Serialize};

/// Metadata row stored at the same position as its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
	pub source_id: String,
	pub product_category: String,
	#[serde(default)]
	pub issue: Option<String>,
	pub chunk_index: usize,
	pub total_chunks: usize,
	pub text: String,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	/// Row position in the index.
	pub position: usize,
	/// Inner product with the normalised query.
	pub score: f32,
	pub metadata: ChunkMetadata,
}

pub const FLAT_IP: &str = "flat_ip";

/// Build parameters written to `config.json` beside the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
	pub embedding_model: String,
	/// Embedding backend that produced the vectors (`bert`, `tei`, `openai`).
	#[serde(default)]
	pub embedding_backend: Option<String>,
	/// Server the backend was reached through, for HTTP backends.
	#[serde(default)]
	pub embedding_endpoint: Option<String>,
	pub dimension: usize,
	pub chunk_size: usize,
	pub chunk_overlap: usize,
	#[serde(default)]
	pub separators: Vec<String>,
	/// Complaints actually sampled, which is below the requested target when
	/// the dataset is smaller.
	pub sample_size: usize,
	pub seed: u64,
	pub total_chunks: usize,
	#[serde(default = "default_index_type")]
	pub index_type: String,
}

fn default_index_type() -> String {
	FLAT_IP.to_string()
}

impl IndexConfig {
	/// Config for an empty index of the given model and dimension.
	pub fn new(embedding_model: impl Into<String>, dimension: usize) -> Self {
		Self {
			embedding_model: embedding_model.into(),
			embedding_backend: None,
			embedding_endpoint: None,
			dimension,
			chunk_size: 0,
			chunk_overlap: 0,
			separators: Vec::new(),
			sample_size: 0,
			seed: 0,
			total_chunks: 0,
			index_type: default_index_type(),
		}
	}
}
