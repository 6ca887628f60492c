use regex::Regex;

use crate::error::{PipelineError, Result};

/// Opening phrases that carry no complaint content. Longer phrases first so
/// the alternation prefers them over their own prefixes.
pub const DEFAULT_BOILERPLATE: &[&str] = &[
    "i am writing to file a complaint",
    "this complaint is regarding",
    "consumer complaint narrative",
    "to whom it may concern",
    "dear sir or madam",
    "i am writing to",
];

/// Normalises raw complaint narratives before chunking and embedding.
///
/// A single pass lowercases, strips boilerplate, redaction masks (`XXXX`),
/// URLs and email addresses, replaces anything outside `[a-z0-9 .,!?-]` with a
/// space, then collapses whitespace. [`NarrativeCleaner::clean`] repeats the
/// pass until the text stops changing, so cleaning is idempotent.
pub struct NarrativeCleaner {
    boilerplate: Option<Regex>,
    redaction: Regex,
    url: Regex,
    email: Regex,
    disallowed: Regex,
    whitespace: Regex,
}

impl NarrativeCleaner {
    /// Cleaner with the default boilerplate list.
    pub fn new() -> Result<Self> {
        Self::with_boilerplate(DEFAULT_BOILERPLATE)
    }

    /// Cleaner with a custom boilerplate phrase list (matched literally, case-insensitively).
    pub fn with_boilerplate(phrases: &[&str]) -> Result<Self> {
        let mut escaped: Vec<String> = phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p))
            .collect();
        escaped.sort_by_key(|p| std::cmp::Reverse(p.len()));

        let boilerplate = if escaped.is_empty() {
            None
        } else {
            Some(compile(&format!("(?:{})", escaped.join("|")))?)
        };

        Ok(Self {
            boilerplate,
            redaction: compile(r"x{2,}")?,
            url: compile(r"\b(?:(?:https?://|www\.)\S*|https?\b|www\b)")?,
            email: compile(r"\S+@\S+")?,
            disallowed: compile(r"[^a-z0-9\s.,!?\-]")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Clean `text` to its fixed point.
    pub fn clean(&self, text: &str) -> String {
        let mut current = self.pass(text);
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = self.url.replace_all(&text, " ");
        let text = self.email.replace_all(&text, " ");
        let text = match &self.boilerplate {
            Some(re) => re.replace_all(&text, " ").into_owned(),
            None => text.into_owned(),
        };
        let text = self.redaction.replace_all(&text, "");
        let text = self.disallowed.replace_all(&text, " ");
        let text = self.whitespace.replace_all(&text, " ");
        text.trim().to_string()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| PipelineError::InvalidConfig(format!("bad cleaning pattern {pattern:?}: {e}")))
}
