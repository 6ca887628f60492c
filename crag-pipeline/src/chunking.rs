use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::record::{Chunk, ComplaintRecord};

/// Separators tried from coarsest to finest. The empty separator cuts at the
/// window edge.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub max_chunk_length: usize,
    /// Characters shared by consecutive chunks.
    pub overlap_length: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: 512,
            overlap_length: 50,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A piece of text with its character offsets in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Sliding-window splitter that prefers natural boundaries.
///
/// Every window is at most `max_chunk_length` characters. The cut lands right
/// after the last occurrence of the coarsest separator found past the overlap
/// region, and the next window starts `overlap_length` characters before the
/// cut. Consecutive chunks therefore share exactly `overlap_length` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
    separators: Vec<Vec<char>>,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.max_chunk_length == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_chunk_length must be greater than 0".into(),
            ));
        }
        if config.overlap_length >= config.max_chunk_length {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap_length ({}) must be smaller than max_chunk_length ({})",
                config.overlap_length, config.max_chunk_length
            )));
        }
        let separators = config.separators.iter().map(|s| s.chars().collect()).collect();
        Ok(Self { config, separators })
    }

    /// Split `text` into overlapping spans.
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let max = self.config.max_chunk_length;
        let overlap = self.config.overlap_length;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < len {
            let window_end = (start + max).min(len);
            if window_end == len {
                spans.push(span(&chars, start, len));
                break;
            }
            let end = self.find_cut(&chars, start, window_end);
            spans.push(span(&chars, start, end));
            start = end - overlap;
        }
        spans
    }

    /// End of the chunk starting at `start`. Always beyond `start + overlap`
    /// so the window makes progress.
    fn find_cut(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let min_end = start + self.config.overlap_length + 1;
        for sep in &self.separators {
            let n = sep.len();
            if n == 0 {
                return window_end;
            }
            if window_end < start + n {
                continue;
            }
            let mut pos = window_end - n;
            while pos + n >= min_end {
                if chars[pos..pos + n] == sep[..] {
                    return pos + n;
                }
                if pos == start {
                    break;
                }
                pos -= 1;
            }
        }
        window_end
    }
}

fn span(chars: &[char], start: usize, end: usize) -> TextSpan {
    TextSpan {
        start,
        end,
        text: chars[start..end].iter().collect(),
    }
}

/// Chunk every record's text, keeping product and issue on each chunk.
pub fn chunk_records(records: &[ComplaintRecord], chunker: &TextChunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for record in records {
        let spans = chunker.split(record.text());
        let total = spans.len();
        chunks.extend(spans.into_iter().enumerate().map(|(i, s)| Chunk {
            source_id: record.id.clone(),
            product_category: record.product_category.clone(),
            issue: record.issue.clone(),
            chunk_index: i,
            total_chunks: total,
            start: s.start,
            end: s.end,
            text: s.text,
        }));
    }
    tracing::debug!(records = records.len(), chunks = chunks.len(), "Chunked records");
    chunks
}
