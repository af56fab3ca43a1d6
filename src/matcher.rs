//! Bulk matching of a supply list against a catalog by embedding similarity.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CatalogEmbeddingCache;
use crate::embedder::Embedder;
use crate::error::MatchError;
use crate::table::{numeric_cell, text_cell, Table};

/// Description column required in both tables.
pub const DESCRIPTION_COLUMN: &str = "Description";
/// Quantity column required in the supply table.
pub const QUANTITY_COLUMN: &str = "Quantity";
/// Catalog price column.
pub const PRICE_COLUMN: &str = "Price";
/// Accepted supply price columns, first present wins.
pub const SUPPLY_PRICE_COLUMNS: &[&str] = &["Price", "Price per Unit"];

const EPSILON: f64 = 1e-10;

/// Best catalog entry for one supply row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    /// Supply row description.
    #[serde(rename = "Supply Description")]
    pub supply_description: String,
    /// Supply row quantity.
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    /// Supply unit price.
    #[serde(rename = "Supply Price")]
    pub supply_price: f64,
    /// Description of the closest catalog row.
    #[serde(rename = "Catalog Description")]
    pub catalog_description: String,
    /// Price of the closest catalog row.
    #[serde(rename = "Catalog Price")]
    pub catalog_price: f64,
    /// `supply_price - catalog_price`.
    #[serde(rename = "Price Difference")]
    pub price_difference: f64,
    /// Cosine similarity of the two descriptions.
    #[serde(rename = "Similarity")]
    pub similarity_score: f32,
}

/// Cosine similarity with a small epsilon in the denominator, clamped to
/// `[-1, 1]`. All-zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON);
    score.clamp(-1.0, 1.0) as f32
}

/// Index and score of the most similar candidate. Ties keep the lowest
/// index.
pub fn best_match(query: &[f32], candidates: &[Vec<f32>]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate);
        if best.map_or(true, |(_, current)| score > current) {
            best = Some((idx, score));
        }
    }
    best
}

/// Matches supply rows to catalog rows with an injected embedder.
pub struct EmbeddingMatcher<E> {
    embedder: E,
}

impl<E: Embedder> EmbeddingMatcher<E> {
    /// Creates a matcher.
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    /// The wrapped embedder.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Emits one [`CatalogMatch`] per supply row, in supply order.
    ///
    /// Column requirements are checked before any embedding request. The
    /// catalog is embedded in one batched call unless `cache` already holds
    /// its vectors; supply descriptions are embedded in one batched call.
    pub fn match_to_catalog(
        &self,
        supply: &Table,
        catalog: &Table,
        cache: Option<&CatalogEmbeddingCache>,
    ) -> Result<Vec<CatalogMatch>, MatchError> {
        if !catalog.is_empty() {
            catalog.require_column("catalog", DESCRIPTION_COLUMN)?;
            catalog.require_column("catalog", PRICE_COLUMN)?;
        }
        if supply.is_empty() {
            return Ok(Vec::new());
        }
        supply.require_column("supply", DESCRIPTION_COLUMN)?;
        supply.require_column("supply", QUANTITY_COLUMN)?;
        let supply_price = supply.require_any_column("supply", SUPPLY_PRICE_COLUMNS)?;
        if catalog.is_empty() {
            return Err(MatchError::EmptyCatalog);
        }

        let catalog_descriptions: Vec<String> = catalog
            .rows()
            .iter()
            .map(|row| text_cell(row, DESCRIPTION_COLUMN))
            .collect();
        let catalog_vectors = self.catalog_vectors(&catalog_descriptions, cache)?;

        let supply_descriptions: Vec<String> = supply
            .rows()
            .iter()
            .map(|row| text_cell(row, DESCRIPTION_COLUMN))
            .collect();
        info!(rows = supply_descriptions.len(), "embedding supply descriptions");
        let supply_vectors = self.embed_all(&supply_descriptions)?;

        let mut matches = Vec::with_capacity(supply.len());
        for ((row, description), vector) in supply
            .rows()
            .iter()
            .zip(supply_descriptions)
            .zip(&supply_vectors)
        {
            let (best_idx, score) =
                best_match(vector, &catalog_vectors).ok_or(MatchError::EmptyCatalog)?;
            let catalog_row = &catalog.rows()[best_idx];
            let quantity = numeric_cell(row, QUANTITY_COLUMN);
            let price = numeric_cell(row, supply_price);
            let catalog_price = numeric_cell(catalog_row, PRICE_COLUMN);
            matches.push(CatalogMatch {
                supply_description: description,
                quantity,
                supply_price: price,
                catalog_description: catalog_descriptions[best_idx].clone(),
                catalog_price,
                price_difference: price - catalog_price,
                similarity_score: score,
            });
        }
        info!(matched = matches.len(), "bulk match complete");
        Ok(matches)
    }

    fn catalog_vectors(
        &self,
        descriptions: &[String],
        cache: Option<&CatalogEmbeddingCache>,
    ) -> Result<Vec<Vec<f32>>, MatchError> {
        if let Some(vectors) = cache.and_then(|cache| cache.get(descriptions.len())) {
            info!(rows = vectors.len(), "using cached catalog embeddings");
            return Ok(vectors);
        }
        info!(rows = descriptions.len(), "embedding catalog descriptions");
        let vectors = self.embed_all(descriptions)?;
        if let Some(cache) = cache {
            if let Err(err) = cache.put(&vectors) {
                warn!(path = %cache.path().display(), error = %format!("{err:#}"), "failed to write embedding cache");
            }
        }
        Ok(vectors)
    }

    fn embed_all(&self, descriptions: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        let inputs: Vec<&str> = descriptions.iter().map(String::as_str).collect();
        let vectors = self
            .embedder
            .embed(&inputs)
            .map_err(MatchError::Embedding)?;
        if vectors.len() != inputs.len() {
            return Err(MatchError::EmbeddingCount {
                expected: inputs.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
