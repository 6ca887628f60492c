use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
	#[error("Invalid dimension: index dimension must be greater than 0")]
	InvalidDimension,
	#[error("Dimension mismatch: expected {expected}, got {actual}")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Count mismatch: {vectors} vectors but {metadata} metadata rows")]
	CountMismatch { vectors: usize, metadata: usize },
	#[error("Artifact not found: {0}")]
	NotFound(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Index corruption: {0}")]
	Corruption(String),
}

impl VectorError {
	pub fn code(&self) -> &str {
		match self {
			Self::InvalidDimension => "INDEX_INVALID_DIMENSION",
			Self::DimensionMismatch { .. } => "INDEX_DIMENSION_MISMATCH",
			Self::CountMismatch { .. } => "INDEX_COUNT_MISMATCH",
			Self::NotFound(_) => "INDEX_NOT_FOUND",
			Self::Io(_) => "INDEX_IO",
			Self::Serialization(_) => "INDEX_SERIALIZATION",
			Self::Corruption(_) => "INDEX_CORRUPT",
		}
	}
}

pub type Result<T> = std::result::Result<T, VectorError>;
