use thiserror::Error;

/// Typed error variants for the crag engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Embedding count mismatch: sent {sent} texts, received {received} vectors")]
    EmbeddingCount { sent: usize, received: usize },

    #[error("Embedding dimension drift: expected {expected}, got {actual}")]
    DimensionDrift { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Nothing to index: {0}")]
    EmptyInput(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error(transparent)]
    Pipeline(#[from] crag_pipeline::PipelineError),

    #[error(transparent)]
    Vector(#[from] crag_vector::VectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Return a machine-readable error code string for this error variant.
    pub fn code(&self) -> &str {
        match self {
            Self::Inference(_) => "INFERENCE_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::EmbeddingCount { .. } => "EMBEDDING_COUNT_MISMATCH",
            Self::DimensionDrift { .. } => "EMBEDDING_DIMENSION_DRIFT",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::EmptyInput(_) => "EMPTY_INPUT",
            Self::Download(_) => "DOWNLOAD_ERROR",
            Self::Pipeline(e) => e.code(),
            Self::Vector(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
