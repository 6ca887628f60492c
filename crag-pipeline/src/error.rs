use thiserror::Error;

/// Errors raised while loading, filtering, sampling or chunking complaints.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("Unsupported input format: {0} (expected .csv or .json)")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Return a machine-readable error code string for this error variant.
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::MissingColumn { .. } => "MISSING_COLUMN",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Malformed(_) => "MALFORMED_RECORD",
            Self::Io(_) => "IO_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
