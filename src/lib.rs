#![warn(missing_docs)]
//! Plumbing SKU matching.
//!
//! Two entry points share this crate: pairwise judgment
//! ([`judge::Judge`]), which settles most pairs with attribute rules and
//! escalates the rest to web evidence and a chat model, and bulk catalog
//! matching ([`matcher::EmbeddingMatcher`]), which pairs each supply row
//! with its nearest catalog row by embedding similarity.

pub mod attributes;
pub mod cache;
pub mod canonical;
pub mod compare;
pub mod config;
pub mod embedder;
pub mod error;
pub mod judge;
pub mod llm;
pub mod logging;
pub mod matcher;
pub mod search;
pub mod sizes;
pub mod table;
pub mod verdict;

pub use attributes::{parse, EndType, FittingType, Material, ProductAttributes, Schedule};
pub use cache::CatalogEmbeddingCache;
pub use canonical::canonicalize;
pub use compare::{compare, HardVerdict};
pub use config::JudgeOptions;
pub use embedder::{Embedder, OpenAiEmbedder};
pub use error::MatchError;
pub use judge::Judge;
pub use llm::{AnthropicProvider, LlmProvider, OpenAiProvider, ProviderRequest};
pub use matcher::{cosine_similarity, CatalogMatch, EmbeddingMatcher};
pub use search::{SearchChain, SearchProvider, SearchSnippet};
pub use table::Table;
pub use verdict::MatchVerdict;
