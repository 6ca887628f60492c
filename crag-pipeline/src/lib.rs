pub mod chunking;
pub mod clean;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod record;
pub mod sampling;

pub use chunking::{chunk_records, ChunkerConfig, TextChunker};
pub use clean::NarrativeCleaner;
pub use error::{PipelineError, Result};
pub use filter::FilterReport;
pub use record::{Chunk, ComplaintRecord};
pub use sampling::{stratified_sample, SampleOptions};
