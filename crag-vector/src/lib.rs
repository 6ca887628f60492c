pub mod cosine;
pub mod error;
pub mod flat_index;
pub mod persistence;
pub mod store;
pub mod types;

pub use error::VectorError;
pub use flat_index::FlatIpIndex;
pub use store::VectorStore;
pub use types::{ChunkMetadata, IndexConfig, SearchHit};
