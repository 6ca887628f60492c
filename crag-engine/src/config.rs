use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::download::DEFAULT_DATASET_URL;

#[derive(Parser, Debug)]
#[command(
    name = "crag",
    version,
    about = "Complaint retrieval pipeline: preprocess, index and question the CFPB complaint data"
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", env = "CRAG_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the CFPB complaint export and unpack it to a CSV file
    Download {
        #[arg(long, default_value = DEFAULT_DATASET_URL, env = "CRAG_DATASET_URL")]
        url: String,

        #[arg(long, default_value = "data/complaints.csv")]
        output: PathBuf,
    },

    /// Filter to the target products, clean narratives and write the cleaned CSV
    Preprocess {
        #[arg(long, default_value = "data/complaints.csv", env = "CRAG_RAW_DATA")]
        input: PathBuf,

        #[arg(long, default_value = "data/filtered_complaints.csv", env = "CRAG_DATA_PATH")]
        output: PathBuf,

        /// Product categories to keep (comma-separated)
        #[arg(long, value_delimiter = ',')]
        products: Vec<String>,
    },

    /// Sample, chunk and embed the cleaned CSV into a vector store
    BuildIndex(BuildIndexArgs),

    /// Ask a question about customer complaints
    Ask {
        question: String,

        /// Restrict retrieval to one product category
        #[arg(long)]
        product: Option<String>,

        /// Number of complaint chunks to retrieve
        #[arg(short = 'k', long, default_value = "5", env = "CRAG_TOP_K")]
        top_k: usize,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Compare complaints across product categories
    Compare {
        question: String,

        #[arg(required = true)]
        products: Vec<String>,

        /// Number of chunks to retrieve per product
        #[arg(short = 'k', long, default_value = "3")]
        k_per_product: usize,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show the complaint chunks closest to a query without generating an answer
    Search {
        query: String,

        /// Restrict retrieval to one product category
        #[arg(long)]
        product: Option<String>,

        #[arg(short = 'k', long, default_value = "5", env = "CRAG_TOP_K")]
        top_k: usize,

        #[arg(long, default_value = "vector_store", env = "CRAG_INDEX_DIR")]
        index_dir: PathBuf,

        #[command(flatten)]
        embedding: EmbeddingArgs,
    },

    /// List product categories present in the vector store
    ListProducts {
        #[arg(long, default_value = "vector_store", env = "CRAG_INDEX_DIR")]
        index_dir: PathBuf,
    },

    /// Read questions from stdin until `exit` or `quit`
    Interactive {
        #[arg(short = 'k', long, default_value = "5", env = "CRAG_TOP_K")]
        top_k: usize,

        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args, Debug)]
pub struct BuildIndexArgs {
    #[arg(long, default_value = "data/filtered_complaints.csv", env = "CRAG_DATA_PATH")]
    pub input: PathBuf,

    #[arg(long, default_value = "vector_store", env = "CRAG_INDEX_DIR")]
    pub output_dir: PathBuf,

    /// Target number of complaints in the stratified sample
    #[arg(long, default_value = "12000", env = "CRAG_SAMPLE_SIZE")]
    pub sample_size: usize,

    #[arg(long, default_value = "42", env = "CRAG_SEED")]
    pub seed: u64,

    /// Let small categories round down to zero rows
    #[arg(long)]
    pub no_ensure_each_category: bool,

    /// Maximum chunk length in characters
    #[arg(long, default_value = "512", env = "CRAG_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "50", env = "CRAG_CHUNK_OVERLAP")]
    pub chunk_overlap: usize,

    #[arg(long, default_value = "32", env = "CRAG_BATCH_SIZE")]
    pub batch_size: usize,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// Local sentence-transformers model via Candle
    Bert,
    /// Text Embeddings Inference server
    Tei,
    /// OpenAI-compatible /embeddings endpoint
    Openai,
}

#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    /// Embedding backend [default: bert]. Query commands default to the
    /// backend recorded with the index.
    #[arg(long, value_enum, env = "CRAG_EMBEDDING_BACKEND")]
    pub embedding_backend: Option<EmbeddingBackend>,

    /// Embedding model (HuggingFace repo ID, local directory, or API model name).
    /// Query commands default to the model recorded with the index.
    #[arg(long, env = "CRAG_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// HuggingFace revision/branch
    #[arg(long)]
    pub revision: Option<String>,

    /// TEI server URL (e.g., http://localhost:8080); query commands fall back
    /// to the server recorded with the index
    #[arg(long, env = "CRAG_TEI_URL")]
    pub tei_url: Option<String>,

    /// Device: "cpu", "cuda", "metal"
    #[arg(long, default_value = "cpu", env = "CRAG_DEVICE")]
    pub device: String,

    /// CUDA device ordinal (when --device cuda)
    #[arg(long, default_value = "0")]
    pub device_id: usize,

    #[command(flatten)]
    pub openai: OpenAiArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI-compatible API root [default: https://api.openai.com/v1]
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "120", env = "CRAG_HTTP_TIMEOUT")]
    pub http_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    #[arg(long, default_value = "gpt-3.5-turbo", env = "CRAG_LLM_MODEL")]
    pub llm_model: String,

    #[arg(long, default_value = "0.3", env = "CRAG_LLM_TEMPERATURE")]
    pub temperature: f64,

    #[arg(long, default_value = "500", env = "CRAG_LLM_MAX_TOKENS")]
    pub max_tokens: usize,
}

/// Arguments shared by the commands that query an existing index.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = "vector_store", env = "CRAG_INDEX_DIR")]
    pub index_dir: PathBuf,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub llm: LlmArgs,
}
