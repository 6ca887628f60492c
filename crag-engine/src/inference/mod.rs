pub mod embedding;

pub use embedding::embed_in_batches;
