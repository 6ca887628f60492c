pub mod agent;
pub mod prompt;

pub use agent::{product_category, Answer, Comparison, RagAgent, Retriever, NO_RESULTS_ANSWER};
