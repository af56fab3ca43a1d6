//! Embedding capability used by the catalog matcher.

use anyhow::Result;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Batched text embedding.
pub trait Embedder {
    /// Returns one vector per input, in input order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier recorded alongside cached vectors.
    fn model(&self) -> &str;
}
