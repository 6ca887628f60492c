// ---------------------------------------------------------------------------
// On-disk layout of a vector store directory
// ---------------------------------------------------------------------------
//
//   complaint_vectors.index   gzip of the binary index below
//   metadata.json             JSON array of ChunkMetadata, index order
//   config.json               IndexConfig
//
// Binary index (all integers little-endian):
//   [8B magic "CRAGIDX1"][4B version][4B dimension][8B count]
//   [count * dimension * 4B f32, row-major]
// ---------------------------------------------------------------------------

use std::io::Read;
use std::path::Path;

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;

use crate::error::{Result, VectorError};
use crate::flat_index::FlatIpIndex;
use crate::store::VectorStore;
use crate::types::{ChunkMetadata, IndexConfig};

pub const INDEX_FILE: &str = "complaint_vectors.index";
pub const METADATA_FILE: &str = "metadata.json";
pub const CONFIG_FILE: &str = "config.json";

pub const MAGIC: &[u8; 8] = b"CRAGIDX1";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

// ---------------------------------------------------------------------------
// Gzip compress / decompress
// ---------------------------------------------------------------------------

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
	let mut encoder = GzEncoder::new(data, Compression::new(6));
	let mut compressed = Vec::new();
	encoder.read_to_end(&mut compressed)?;
	Ok(compressed)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
	let mut decoder = GzDecoder::new(data);
	let mut decompressed = Vec::new();
	decoder
		.read_to_end(&mut decompressed)
		.map_err(|e| VectorError::Corruption(format!("Invalid gzip stream: {}", e)))?;
	Ok(decompressed)
}

// ---------------------------------------------------------------------------
// Binary index codec
// ---------------------------------------------------------------------------

pub fn encode_index(index: &FlatIpIndex) -> Vec<u8> {
	let data = index.as_slice();
	let mut buf = Vec::with_capacity(HEADER_LEN + data.len() * 4);
	buf.extend_from_slice(MAGIC);
	buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
	buf.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
	buf.extend_from_slice(&(index.len() as u64).to_le_bytes());
	for f in data {
		buf.extend_from_slice(&f.to_le_bytes());
	}
	buf
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
	let bytes = data.get(offset..offset + 4)?;
	Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
	let bytes: [u8; 8] = data.get(offset..offset + 8)?.try_into().ok()?;
	Some(u64::from_le_bytes(bytes))
}

pub fn decode_index(data: &[u8]) -> Result<FlatIpIndex> {
	if data.len() < HEADER_LEN {
		return Err(VectorError::Corruption("Truncated: header".into()));
	}
	if &data[..8] != MAGIC {
		return Err(VectorError::Corruption("Bad magic: not a crag index file".into()));
	}
	let version = read_u32_le(data, 8)
		.ok_or_else(|| VectorError::Corruption("Truncated: version".into()))?;
	if version != FORMAT_VERSION {
		return Err(VectorError::Corruption(format!(
			"Unsupported index version: {}",
			version
		)));
	}
	let dimension = read_u32_le(data, 12)
		.ok_or_else(|| VectorError::Corruption("Truncated: dimension".into()))? as usize;
	let count = read_u64_le(data, 16)
		.ok_or_else(|| VectorError::Corruption("Truncated: count".into()))? as usize;

	let body = &data[HEADER_LEN..];
	let expected = count
		.checked_mul(dimension)
		.and_then(|n| n.checked_mul(4))
		.ok_or_else(|| VectorError::Corruption("Header sizes overflow".into()))?;
	if body.len() != expected {
		return Err(VectorError::Corruption(format!(
			"Vector data is {} bytes, header promises {}",
			body.len(),
			expected
		)));
	}
	let floats = body
		.chunks_exact(4)
		.map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
		.collect();
	FlatIpIndex::from_raw(dimension, floats)
}

// ---------------------------------------------------------------------------
// Directory I/O
// ---------------------------------------------------------------------------

/// Write index, metadata and config into `dir`, creating it if needed.
pub fn save_store(dir: &Path, store: &VectorStore) -> Result<()> {
	std::fs::create_dir_all(dir)?;

	let compressed = compress(&encode_index(store.index()))?;
	std::fs::write(dir.join(INDEX_FILE), compressed)?;

	let metadata = serde_json::to_vec(store.metadata())
		.map_err(|e| VectorError::Serialization(format!("Failed to serialize metadata: {}", e)))?;
	std::fs::write(dir.join(METADATA_FILE), metadata)?;

	let config = serde_json::to_vec_pretty(store.config())
		.map_err(|e| VectorError::Serialization(format!("Failed to serialize config: {}", e)))?;
	std::fs::write(dir.join(CONFIG_FILE), config)?;

	tracing::info!(
		dir = %dir.display(),
		vectors = store.len(),
		dimension = store.dimension(),
		"Saved vector store"
	);
	Ok(())
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>> {
	let path = dir.join(name);
	if !path.is_file() {
		return Err(VectorError::NotFound(path.display().to_string()));
	}
	Ok(std::fs::read(path)?)
}

/// Read only `config.json` from a store directory.
pub fn load_config(dir: &Path) -> Result<IndexConfig> {
	let bytes = read_artifact(dir, CONFIG_FILE)?;
	serde_json::from_slice(&bytes)
		.map_err(|e| VectorError::Corruption(format!("Invalid {}: {}", CONFIG_FILE, e)))
}

/// Load and cross-check the three artifacts.
pub fn load_store(dir: &Path) -> Result<VectorStore> {
	let config = load_config(dir)?;

	let raw = read_artifact(dir, INDEX_FILE)?;
	let index = decode_index(&decompress(&raw)?)?;

	let bytes = read_artifact(dir, METADATA_FILE)?;
	let metadata: Vec<ChunkMetadata> = serde_json::from_slice(&bytes)
		.map_err(|e| VectorError::Corruption(format!("Invalid {}: {}", METADATA_FILE, e)))?;

	let store = VectorStore::from_parts(index, metadata, config)?;
	tracing::info!(dir = %dir.display(), vectors = store.len(), "Loaded vector store");
	Ok(store)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn meta(i: usize) -> ChunkMetadata {
		ChunkMetadata {
			source_id: format!("s{i}"),
			product_category: if i % 2 == 0 { "Credit card" } else { "Savings account" }.into(),
			issue: Some("Fees".into()),
			chunk_index: 0,
			total_chunks: 1,
			text: format!("chunk {i}: ünïcödé"),
		}
	}

	fn sample_store() -> VectorStore {
		let mut store = VectorStore::new(IndexConfig::new("mini", 4)).unwrap();
		let vectors: Vec<Vec<f32>> = (0..5)
			.map(|i| vec![i as f32 + 1.0, 0.5, -(i as f32), 2.0])
			.collect();
		store.add(&vectors, (0..5).map(meta).collect()).unwrap();
		store
	}

	#[test]
	fn compress_decompress_roundtrip() {
		let data = b"hello hello hello hello";
		let compressed = compress(data).unwrap();
		assert_eq!(&compressed[..2], &[0x1fu8, 0x8b]);
		assert_eq!(decompress(&compressed).unwrap(), data);
	}

	#[test]
	fn index_header_layout() {
		let store = sample_store();
		let bytes = encode_index(store.index());
		assert_eq!(&bytes[..8], b"CRAGIDX1");
		assert_eq!(read_u32_le(&bytes, 8), Some(1));
		assert_eq!(read_u32_le(&bytes, 12), Some(4));
		assert_eq!(read_u64_le(&bytes, 16), Some(5));
		assert_eq!(bytes.len(), HEADER_LEN + 5 * 4 * 4);
		assert_eq!(decode_index(&bytes).unwrap(), *store.index());
	}

	#[test]
	fn decode_rejects_corrupt_data() {
		let bytes = encode_index(sample_store().index());

		let mut bad_magic = bytes.clone();
		bad_magic[0] = b'X';
		assert_eq!(decode_index(&bad_magic).unwrap_err().code(), "INDEX_CORRUPT");

		let mut bad_version = bytes.clone();
		bad_version[8] = 9;
		assert!(decode_index(&bad_version).is_err());

		assert!(decode_index(&bytes[..bytes.len() - 3]).is_err());
		assert!(decode_index(&bytes[..10]).is_err());
		assert!(decompress(b"not gzip").is_err());
	}

	#[test]
	fn save_load_directory_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let target = dir.path().join("vector_store");
		let store = sample_store();
		store.save(&target).unwrap();

		for name in [INDEX_FILE, METADATA_FILE, CONFIG_FILE] {
			assert!(target.join(name).exists(), "{name} missing");
		}

		let loaded = VectorStore::load(&target).unwrap();
		assert_eq!(loaded.len(), 5);
		assert_eq!(loaded.metadata(), store.metadata());
		assert_eq!(loaded.config(), store.config());
		assert_eq!(loaded.index(), store.index());
		assert_eq!(load_config(&target).unwrap().total_chunks, 5);
	}

	#[test]
	fn load_detects_count_disagreement() {
		let dir = tempfile::tempdir().unwrap();
		let store = sample_store();
		store.save(dir.path()).unwrap();

		let truncated = serde_json::to_vec(&store.metadata()[..4]).unwrap();
		std::fs::write(dir.path().join(METADATA_FILE), truncated).unwrap();

		let err = VectorStore::load(dir.path()).unwrap_err();
		assert_eq!(err.code(), "INDEX_CORRUPT");
	}

	#[test]
	fn load_detects_dimension_disagreement() {
		let dir = tempfile::tempdir().unwrap();
		let store = sample_store();
		store.save(dir.path()).unwrap();

		let mut config = store.config().clone();
		config.dimension = 8;
		std::fs::write(dir.path().join(CONFIG_FILE), serde_json::to_vec(&config).unwrap()).unwrap();

		assert!(matches!(VectorStore::load(dir.path()), Err(VectorError::Corruption(_))));
	}

	#[test]
	fn load_missing_directory() {
		let dir = tempfile::tempdir().unwrap();
		let err = VectorStore::load(&dir.path().join("absent")).unwrap_err();
		assert_eq!(err.code(), "INDEX_NOT_FOUND");
	}
}
