use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, VectorError};
use crate::flat_index::FlatIpIndex;
use crate::persistence;
use crate::types::{ChunkMetadata, IndexConfig, SearchHit};

/// Flat index plus one metadata row per vector, kept in lockstep.
#[derive(Debug, Clone)]
pub struct VectorStore {
	index: FlatIpIndex,
	metadata: Vec<ChunkMetadata>,
	config: IndexConfig,
}

impl VectorStore {
	/// Empty store sized by `config.dimension`.
	pub fn new(mut config: IndexConfig) -> Result<Self> {
		let index = FlatIpIndex::new(config.dimension)?;
		config.total_chunks = 0;
		Ok(Self {
			index,
			metadata: Vec::new(),
			config,
		})
	}

	/// Assemble from loaded parts, verifying alignment.
	pub(crate) fn from_parts(
		index: FlatIpIndex,
		metadata: Vec<ChunkMetadata>,
		config: IndexConfig,
	) -> Result<Self> {
		if index.dimension() != config.dimension {
			return Err(VectorError::Corruption(format!(
				"index dimension {} does not match config dimension {}",
				index.dimension(),
				config.dimension
			)));
		}
		if index.len() != metadata.len() || index.len() != config.total_chunks {
			return Err(VectorError::Corruption(format!(
				"row counts disagree: {} vectors, {} metadata rows, config total_chunks {}",
				index.len(),
				metadata.len(),
				config.total_chunks
			)));
		}
		Ok(Self {
			index,
			metadata,
			config,
		})
	}

	pub fn len(&self) -> usize {
		self.metadata.len()
	}

	pub fn is_empty(&self) -> bool {
		self.metadata.is_empty()
	}

	pub fn dimension(&self) -> usize {
		self.index.dimension()
	}

	pub fn config(&self) -> &IndexConfig {
		&self.config
	}

	pub fn index(&self) -> &FlatIpIndex {
		&self.index
	}

	pub fn metadata(&self) -> &[ChunkMetadata] {
		&self.metadata
	}

	/// Append vectors with their metadata rows. Counts must match; nothing
	/// is added on error.
	pub fn add(&mut self, vectors: &[Vec<f32>], metadata: Vec<ChunkMetadata>) -> Result<()> {
		if vectors.len() != metadata.len() {
			return Err(VectorError::CountMismatch {
				vectors: vectors.len(),
				metadata: metadata.len(),
			});
		}
		self.index.add(vectors)?;
		self.metadata.extend(metadata);
		self.config.total_chunks = self.metadata.len();
		Ok(())
	}

	/// Top `k` chunks for `query`.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		self.search_product(query, k, None)
	}

	/// Top `k` chunks for `query`, optionally restricted to one product
	/// category (case-insensitive).
	pub fn search_product(
		&self,
		query: &[f32],
		k: usize,
		product: Option<&str>,
	) -> Result<Vec<SearchHit>> {
		let hits = match product {
			Some(p) => self.index.search_where(query, k, |i| {
				self.metadata[i].product_category.eq_ignore_ascii_case(p)
			})?,
			None => self.index.search(query, k)?,
		};
		Ok(hits
			.into_iter()
			.map(|(position, score)| SearchHit {
				position,
				score,
				metadata: self.metadata[position].clone(),
			})
			.collect())
	}

	/// Distinct product categories, sorted.
	pub fn products(&self) -> Vec<String> {
		self.product_counts().into_iter().map(|(p, _)| p).collect()
	}

	/// Chunk count per product category, sorted by category.
	pub fn product_counts(&self) -> Vec<(String, usize)> {
		let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
		for m in &self.metadata {
			*counts.entry(m.product_category.as_str()).or_insert(0) += 1;
		}
		counts.into_iter().map(|(p, n)| (p.to_string(), n)).collect()
	}

	/// Persist the three artifacts into `dir`.
	pub fn save(&self, dir: &Path) -> Result<()> {
		persistence::save_store(dir, self)
	}

	/// Load a store written by [`VectorStore::save`].
	pub fn load(dir: &Path) -> Result<Self> {
		persistence::load_store(dir)
	}
}
