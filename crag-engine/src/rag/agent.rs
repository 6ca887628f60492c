use crag_pipeline::filter::canonical_product;
use crag_vector::{SearchHit, VectorStore};
use serde::Serialize;

use super::prompt::{format_context, format_sections, render, ANALYSIS_TEMPLATE, COMPARISON_TEMPLATE};
use crate::error::{EngineError, Result};
use crate::models::{Embedder, Generator};

/// Returned without calling the generator when retrieval finds nothing.
pub const NO_RESULTS_ANSWER: &str =
    "No relevant complaints were found for this question, so no answer could be generated.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub product_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub products_compared: Vec<String>,
}

/// Fold a product name given by the user into the category stored in the
/// index. CFPB names such as "Credit card or prepaid card" map to their
/// canonical category; anything else is matched as typed.
pub fn product_category(product: &str) -> String {
    canonical_product(product)
        .map(String::from)
        .unwrap_or_else(|| product.trim().to_string())
}

/// Query embedding plus similarity search over a loaded store.
pub struct Retriever {
    store: VectorStore,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: Box<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Distinct product categories present in the index.
    pub fn products(&self) -> Vec<String> {
        self.store.products()
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let result = self
            .embedder
            .embed(&[query.to_string()])
            .map_err(|e| EngineError::Inference(format!("{e:#}")))?;
        let vector = result
            .embeddings
            .into_iter()
            .next()
            .ok_or(EngineError::EmbeddingCount { sent: 1, received: 0 })?;
        if vector.len() != self.store.dimension() {
            return Err(EngineError::DimensionDrift {
                expected: self.store.dimension(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Top `k` chunks for `query`, optionally within one product category.
    pub fn retrieve(&self, query: &str, k: usize, product: Option<&str>) -> Result<Vec<SearchHit>> {
        let vector = self.embed_query(query)?;
        let category = product.map(product_category);
        let hits = self.store.search_product(&vector, k, category.as_deref())?;
        tracing::debug!(query, k, product = ?category, hits = hits.len(), "Retrieved chunks");
        Ok(hits)
    }

    /// Embed `query` once and take the top `k` chunks of each category.
    fn retrieve_each(&self, query: &str, categories: &[String], k: usize) -> Result<Vec<(String, Vec<SearchHit>)>> {
        let vector = self.embed_query(query)?;
        let mut sections = Vec::with_capacity(categories.len());
        for category in categories {
            let hits = self.store.search_product(&vector, k, Some(category))?;
            sections.push((category.clone(), hits));
        }
        Ok(sections)
    }
}

/// Retrieval-augmented question answering over a loaded vector store.
pub struct RagAgent {
    retriever: Retriever,
    generator: Box<dyn Generator>,
    default_k: usize,
}

impl RagAgent {
    pub fn new(
        store: VectorStore,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
        default_k: usize,
    ) -> Self {
        Self {
            retriever: Retriever::new(store, embedder),
            generator,
            default_k,
        }
    }

    /// Distinct product categories present in the index.
    pub fn products(&self) -> Vec<String> {
        self.retriever.products()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let result = self
            .generator
            .generate(None, prompt)
            .map_err(|e| EngineError::Generation(format!("{e:#}")))?;
        tracing::debug!(
            prompt_tokens = result.prompt_tokens,
            completion_tokens = result.completion_tokens,
            "Generated answer"
        );
        Ok(result.text.trim().to_string())
    }

    /// Answer `question` from the `k` most relevant complaint chunks.
    pub fn ask(&self, question: &str, product: Option<&str>, k: Option<usize>) -> Result<Answer> {
        let k = k.unwrap_or(self.default_k);
        let category = product.map(product_category);
        tracing::info!(question, product = ?category, k, "Processing query");

        let sources = self.retriever.retrieve(question, k, category.as_deref())?;
        let answer = if sources.is_empty() {
            NO_RESULTS_ANSWER.to_string()
        } else {
            let prompt = render(ANALYSIS_TEMPLATE, question, &format_context(&sources));
            self.complete(&prompt)?
        };

        Ok(Answer {
            answer,
            sources,
            product_filter: category,
        })
    }

    /// Compare complaint patterns across `products`, retrieving
    /// `k_per_product` chunks for each.
    pub fn compare(&self, question: &str, products: &[String], k_per_product: usize) -> Result<Comparison> {
        if products.is_empty() {
            return Err(EngineError::InvalidArgument("compare needs at least one product".into()));
        }
        let categories: Vec<String> = products.iter().map(|p| product_category(p)).collect();
        tracing::info!(question, products = ?categories, k_per_product, "Comparing products");

        let sections = self.retriever.retrieve_each(question, &categories, k_per_product)?;
        let sources: Vec<SearchHit> = sections.iter().flat_map(|(_, h)| h.iter().cloned()).collect();
        let answer = if sources.is_empty() {
            NO_RESULTS_ANSWER.to_string()
        } else {
            let prompt = render(COMPARISON_TEMPLATE, question, &format_sections(&sections));
            self.complete(&prompt)?
        };

        Ok(Comparison {
            answer,
            sources,
            products_compared: categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::{EmbedResult, GenerationResult};
    use crag_vector::{ChunkMetadata, IndexConfig};

    /// Maps a text to a 2-d vector: "card" texts point one way, the rest the other.
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn embed(&self, texts: &[String]) -> anyhow::Result<EmbedResult> {
            let embeddings = texts
                .iter()
                .map(|t| if t.contains("card") { vec![1.0, 0.1] } else { vec![0.1, 1.0] })
                .collect();
            Ok(EmbedResult { embeddings, prompt_tokens: 0 })
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    #[derive(Clone, Default)]
    struct Echo {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Generator for Echo {
        fn generate(&self, _system: Option<&str>, prompt: &str) -> anyhow::Result<GenerationResult> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(GenerationResult { text: "  summary  ".into(), ..Default::default() })
        }
    }

    fn meta(id: &str, product: &str, text: &str) -> ChunkMetadata {
        ChunkMetadata {
            source_id: id.into(),
            product_category: product.into(),
            issue: Some("Other".into()),
            chunk_index: 0,
            total_chunks: 1,
            text: text.into(),
        }
    }

    fn agent(echo: Echo) -> RagAgent {
        let mut store = VectorStore::new(IndexConfig::new("axis", 2)).unwrap();
        store
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.2]],
                vec![
                    meta("1", "Credit card", "card declined"),
                    meta("2", "Personal loan", "loan fee"),
                    meta("3", "Credit card", "card fee"),
                ],
            )
            .unwrap();
        RagAgent::new(store, Box::new(AxisEmbedder), Box::new(echo), 5)
    }

    #[test]
    fn ask_builds_prompt_from_sources() {
        let echo = Echo::default();
        let agent = agent(echo.clone());
        let answer = agent.ask("card problems?", None, Some(2)).unwrap();

        assert_eq!(answer.answer, "summary");
        let ids: Vec<&str> = answer.sources.iter().map(|h| h.metadata.source_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        let prompts = echo.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User Question: card problems?"));
        assert!(prompts[0].contains("Complaint 1 (Product: Credit card, Issue: Other):\ncard declined..."));
    }

    #[test]
    fn ask_with_unknown_product_skips_generation() {
        let echo = Echo::default();
        let agent = agent(echo.clone());
        let answer = agent.ask("anything", Some("Mortgage"), None).unwrap();
        assert_eq!(answer.answer, NO_RESULTS_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.product_filter.as_deref(), Some("Mortgage"));
        assert!(echo.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn compare_retrieves_per_product() {
        let echo = Echo::default();
        let agent = agent(echo.clone());
        let products = vec!["Credit card".to_string(), "Personal loan".to_string()];
        let result = agent.compare("fees?", &products, 1).unwrap();

        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].metadata.product_category, "Credit card");
        assert_eq!(result.sources[1].metadata.product_category, "Personal loan");
        let prompts = echo.prompts.lock().unwrap();
        assert!(prompts[0].contains("=== Credit card Complaints ==="));
        assert!(prompts[0].contains("=== Personal loan Complaints ==="));
        assert!(agent.compare("x", &[], 1).is_err());
    }

    #[test]
    fn cfpb_product_names_resolve_to_categories() {
        let echo = Echo::default();
        let agent = agent(echo.clone());

        let answer = agent.ask("card problems?", Some("Credit card or prepaid card"), Some(5)).unwrap();
        assert_eq!(answer.product_filter.as_deref(), Some("Credit card"));
        assert_eq!(answer.sources.len(), 2);

        let products = vec!["credit card or prepaid card".to_string(), "Payday loan".to_string()];
        let result = agent.compare("fees?", &products, 1).unwrap();
        assert_eq!(result.products_compared, vec!["Credit card", "Personal loan"]);
        assert_eq!(result.sources.len(), 2);
        assert_ne!(result.answer, NO_RESULTS_ANSWER);
    }

    #[test]
    fn unknown_names_are_matched_as_typed() {
        assert_eq!(product_category("  Mortgage "), "Mortgage");
        assert_eq!(product_category("checking account"), "Savings account");
    }

    #[test]
    fn retriever_works_without_a_generator() {
        let mut store = VectorStore::new(IndexConfig::new("axis", 2)).unwrap();
        store
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0]], vec![meta("1", "Credit card", "card"), meta("2", "Personal loan", "loan")])
            .unwrap();
        let retriever = Retriever::new(store, Box::new(AxisEmbedder));
        let hits = retriever.retrieve("card declined", 1, None).unwrap();
        assert_eq!(hits[0].metadata.source_id, "1");
        assert!(retriever.retrieve("card", 5, Some("Mortgage")).unwrap().is_empty());
    }

    #[test]
    fn lists_products() {
        assert_eq!(agent(Echo::default()).products(), vec!["Credit card", "Personal loan"]);
    }
}
