use serde::{Deserialize, Serialize};

/// One complaint as read from the source dataset.
///
/// `cleaned_narrative` is empty until the cleaning step has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub id: String,
    pub product_category: String,
    pub raw_narrative: String,
    #[serde(default)]
    pub cleaned_narrative: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
}

impl ComplaintRecord {
    pub fn new(
        id: impl Into<String>,
        product_category: impl Into<String>,
        raw_narrative: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            product_category: product_category.into(),
            raw_narrative: raw_narrative.into(),
            cleaned_narrative: String::new(),
            company: None,
            state: None,
            issue: None,
        }
    }

    /// Text used for chunking: the cleaned narrative when present, else the raw one.
    pub fn text(&self) -> &str {
        if self.cleaned_narrative.is_empty() {
            &self.raw_narrative
        } else {
            &self.cleaned_narrative
        }
    }
}

/// A bounded slice of a complaint narrative, the unit that gets embedded.
///
/// `start` and `end` are character offsets into the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    pub product_category: String,
    pub issue: Option<String>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}
