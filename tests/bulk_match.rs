use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use skumatch::{CatalogEmbeddingCache, Embedder, EmbeddingMatcher, MatchError, Table};
use tempfile::tempdir;

const VOCAB: &[&str] = &["PVC", "CPVC", "TEE", "ELBOW", "CAP", "2", "3"];

/// Keyword-count vectors over a tiny vocabulary.
#[derive(Clone, Default)]
struct KeywordEmbedder {
    calls: Arc<AtomicUsize>,
    inputs: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn inputs(&self) -> usize {
        self.inputs.load(Ordering::SeqCst)
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let words: Vec<&str> = text.split_whitespace().collect();
                VOCAB
                    .iter()
                    .map(|term| words.iter().filter(|w| *w == term).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("429 Too Many Requests")
    }

    fn model(&self) -> &str {
        "failing"
    }
}

struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0]])
    }

    fn model(&self) -> &str {
        "short"
    }
}

fn table(rows: Vec<Value>) -> Table {
    Table::from_rows(
        rows.into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                _ => panic!("rows must be objects"),
            })
            .collect(),
    )
}

fn catalog() -> Table {
    table(vec![
        json!({"Description": "PVC TEE 2", "Price": 1.25}),
        json!({"Description": "CPVC ELBOW 3", "Price": "2,000.50"}),
        json!({"Description": "PVC CAP 3", "Price": 0.4}),
    ])
}

fn supply() -> Table {
    table(vec![
        json!({"Description": "CPVC ELBOW 3", "Quantity": 10, "Price per Unit": "1,999.50"}),
        json!({"Description": "PVC TEE 2", "Quantity": "4", "Price per Unit": 2}),
    ])
}

#[test]
fn matches_each_supply_row_to_nearest_catalog_row() {
    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());
    let matches = matcher.match_to_catalog(&supply(), &catalog(), None).unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].catalog_description, "CPVC ELBOW 3");
    assert_eq!(matches[0].quantity, 10.0);
    assert_eq!(matches[0].supply_price, 1999.5);
    assert_eq!(matches[0].catalog_price, 2000.5);
    assert_eq!(matches[0].price_difference, -1.0);
    assert!((matches[0].similarity_score - 1.0).abs() < 1e-6);

    assert_eq!(matches[1].catalog_description, "PVC TEE 2");
    assert_eq!(matches[1].quantity, 4.0);
    assert_eq!(matches[1].price_difference, 0.75);

    // one batched call per side
    assert_eq!(embedder.calls(), 2);
    assert_eq!(embedder.inputs(), 5);
}

#[test]
fn cached_catalog_vectors_are_reused() {
    let dir = tempdir().unwrap();
    let cache = CatalogEmbeddingCache::new("catalog", dir.path().join("catalog.embeddings.json"), "keyword-test");
    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());

    let first = matcher
        .match_to_catalog(&supply(), &catalog(), Some(&cache))
        .unwrap();
    assert_eq!(embedder.calls(), 2);
    assert!(cache.path().exists());

    let second = matcher
        .match_to_catalog(&supply(), &catalog(), Some(&cache))
        .unwrap();
    assert_eq!(embedder.calls(), 3);
    assert_eq!(embedder.inputs(), 3 + 2 + 2);
    assert_eq!(first, second);
}

#[test]
fn cache_for_a_different_catalog_size_is_recomputed() {
    let dir = tempdir().unwrap();
    let cache = CatalogEmbeddingCache::new("catalog", dir.path().join("c.json"), "keyword-test");
    cache.put(&[vec![1.0; VOCAB.len()]]).unwrap();

    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());
    matcher
        .match_to_catalog(&supply(), &catalog(), Some(&cache))
        .unwrap();
    assert_eq!(embedder.calls(), 2);
    assert_eq!(cache.get(3).map(|v| v.len()), Some(3));
}

#[test]
fn cache_written_for_another_catalog_is_recomputed() {
    let dir = tempdir().unwrap();
    let shared = dir.path().join("shared.embeddings.json");
    let first = table(vec![
        json!({"Description": "PVC TEE 2", "Price": 1}),
        json!({"Description": "PVC CAP 2", "Price": 2}),
    ]);
    let second = table(vec![
        json!({"Description": "PVC CAP 2", "Price": 3}),
        json!({"Description": "PVC TEE 2", "Price": 4}),
    ]);
    let supply = table(vec![json!({"Description": "PVC TEE 2", "Quantity": 1, "Price": 5})]);

    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());
    let cache_a = CatalogEmbeddingCache::new("a.jsonl", &shared, "keyword-test");
    let matches = matcher
        .match_to_catalog(&supply, &first, Some(&cache_a))
        .unwrap();
    assert_eq!(matches[0].catalog_price, 1.0);

    let cache_b = CatalogEmbeddingCache::new("b.jsonl", &shared, "keyword-test");
    let matches = matcher
        .match_to_catalog(&supply, &second, Some(&cache_b))
        .unwrap();
    assert_eq!(matches[0].catalog_description, "PVC TEE 2");
    assert_eq!(matches[0].catalog_price, 4.0);
    assert_eq!(embedder.calls(), 4);
    assert!(cache_a.get(2).is_none());
    assert!(cache_b.get(2).is_some());
}

#[test]
fn missing_columns_fail_before_any_embedding() {
    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());

    let no_price = table(vec![json!({"Description": "PVC TEE 2", "Quantity": 1})]);
    let err = matcher.match_to_catalog(&no_price, &catalog(), None).unwrap_err();
    assert!(matches!(err, MatchError::MissingColumn { table: "supply", .. }));

    let no_quantity = table(vec![json!({"Description": "PVC TEE 2", "Price": 1})]);
    let err = matcher.match_to_catalog(&no_quantity, &catalog(), None).unwrap_err();
    assert!(matches!(err, MatchError::MissingColumn { table: "supply", ref column } if column == "Quantity"));

    let catalog_no_price = table(vec![json!({"Description": "PVC TEE 2"})]);
    let err = matcher
        .match_to_catalog(&supply(), &catalog_no_price, None)
        .unwrap_err();
    assert!(matches!(err, MatchError::MissingColumn { table: "catalog", ref column } if column == "Price"));

    let err = matcher
        .match_to_catalog(&Table::default(), &catalog_no_price, None)
        .unwrap_err();
    assert!(matches!(err, MatchError::MissingColumn { table: "catalog", ref column } if column == "Price"));

    assert_eq!(embedder.calls(), 0);
}

#[test]
fn empty_inputs() {
    let embedder = KeywordEmbedder::default();
    let matcher = EmbeddingMatcher::new(embedder.clone());

    let matches = matcher
        .match_to_catalog(&Table::default(), &catalog(), None)
        .unwrap();
    assert!(matches.is_empty());

    let err = matcher
        .match_to_catalog(&supply(), &Table::default(), None)
        .unwrap_err();
    assert!(matches!(err, MatchError::EmptyCatalog));
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn ties_resolve_to_the_first_catalog_row() {
    let duplicated = table(vec![
        json!({"Description": "PVC CAP 2", "Price": 1}),
        json!({"Description": "PVC TEE 2", "Price": 2}),
        json!({"Description": "PVC TEE 2", "Price": 3}),
    ]);
    let supply = table(vec![json!({"Description": "PVC TEE 2", "Quantity": 1, "Price": 5})]);
    let matcher = EmbeddingMatcher::new(KeywordEmbedder::default());
    let matches = matcher.match_to_catalog(&supply, &duplicated, None).unwrap();
    assert_eq!(matches[0].catalog_price, 2.0);
    assert_eq!(matches[0].price_difference, 3.0);
}

#[test]
fn embedding_failures_abort_the_batch() {
    let matcher = EmbeddingMatcher::new(FailingEmbedder);
    let err = matcher.match_to_catalog(&supply(), &catalog(), None).unwrap_err();
    assert!(matches!(err, MatchError::Embedding(_)));

    let matcher = EmbeddingMatcher::new(ShortEmbedder);
    let err = matcher.match_to_catalog(&supply(), &catalog(), None).unwrap_err();
    assert!(matches!(
        err,
        MatchError::EmbeddingCount {
            expected: 3,
            actual: 1
        }
    ));
}

#[test]
fn output_rows_use_report_column_names() {
    let matcher = EmbeddingMatcher::new(KeywordEmbedder::default());
    let matches = matcher.match_to_catalog(&supply(), &catalog(), None).unwrap();
    let json = serde_json::to_value(&matches[1]).unwrap();
    assert_eq!(json["Supply Description"], "PVC TEE 2");
    assert_eq!(json["Catalog Description"], "PVC TEE 2");
    assert!(json["Similarity"].is_number());
}
