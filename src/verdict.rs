//! Pairwise verdict record and decoding of judge model output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::ProductAttributes;
use crate::search::SearchSnippet;

/// Reason attached to every fallback verdict.
pub const FALLBACK_REASON: &str = "LLM judging error or invalid JSON";

/// URLs borrowed from retrieved snippets when the model cites none.
const MAX_BACKFILL_URLS: usize = 3;

/// Confidence assumed when the model omits one.
const DEFAULT_MODEL_CONFIDENCE: f32 = 0.5;

/// The two parsed records a verdict was reached on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyAttributes {
    /// First description.
    #[serde(rename = "A")]
    pub a: ProductAttributes,
    /// Second description.
    #[serde(rename = "B")]
    pub b: ProductAttributes,
}

/// Outcome of a pairwise same-product judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    /// Whether the two descriptions name the same product.
    pub same_product: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Why the products differ or why no decision could be made.
    pub blocking_reasons: Vec<String>,
    /// Parsed records of both descriptions.
    pub key_attributes: KeyAttributes,
    /// Evidence URLs.
    #[serde(rename = "best_supporting_urls", alias = "supporting_urls")]
    pub supporting_urls: Vec<String>,
}

impl MatchVerdict {
    /// Verdict reached by the attribute rules alone.
    pub fn from_rules(
        same: bool,
        reasons: Vec<String>,
        a: ProductAttributes,
        b: ProductAttributes,
    ) -> Self {
        Self {
            same_product: same,
            confidence: if same { 0.95 } else { 0.99 },
            blocking_reasons: reasons,
            key_attributes: KeyAttributes { a, b },
            supporting_urls: Vec::new(),
        }
    }

    /// Conservative negative verdict used when the model call or its output
    /// cannot be used.
    pub fn fallback(a: ProductAttributes, b: ProductAttributes, snippets: &[SearchSnippet]) -> Self {
        Self {
            same_product: false,
            confidence: if snippets.is_empty() { 0.5 } else { 0.6 },
            blocking_reasons: vec![FALLBACK_REASON.to_string()],
            key_attributes: KeyAttributes { a, b },
            supporting_urls: snippet_urls(snippets),
        }
    }

    /// Decodes raw model text into a verdict, backfilling what the model
    /// left out. Returns `None` when no JSON object with a boolean
    /// `same_product` can be recovered.
    pub fn from_model_output(
        text: &str,
        a: ProductAttributes,
        b: ProductAttributes,
        snippets: &[SearchSnippet],
    ) -> Option<Self> {
        let object = extract_verdict_object(text)?;
        let same_product = object.get("same_product")?.as_bool()?;

        let confidence = object
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|value| value.clamp(0.0, 1.0) as f32)
            .unwrap_or(DEFAULT_MODEL_CONFIDENCE);

        let blocking_reasons = string_list(object.get("blocking_reasons"));

        let mut supporting_urls = string_list(
            object
                .get("best_supporting_urls")
                .or_else(|| object.get("supporting_urls")),
        );
        if supporting_urls.is_empty() {
            supporting_urls = snippet_urls(snippets);
        }

        Some(Self {
            same_product,
            confidence,
            blocking_reasons,
            key_attributes: KeyAttributes { a, b },
            supporting_urls,
        })
    }
}

fn snippet_urls(snippets: &[SearchSnippet]) -> Vec<String> {
    snippets
        .iter()
        .filter(|snippet| !snippet.url.is_empty())
        .take(MAX_BACKFILL_URLS)
        .map(|snippet| snippet.url.clone())
        .collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Recovers the first JSON object carrying a boolean `same_product`.
///
/// Tries the whole text, then a fenced code block, then the first balanced
/// brace-delimited substring.
pub fn extract_verdict_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    [Some(text), fenced_block(text), first_balanced_object(text)]
        .into_iter()
        .flatten()
        .filter_map(parse_object)
        .find(|object| object.get("same_product").map_or(false, Value::is_boolean))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Body of the first ```` ``` ```` fence (optionally tagged `json`) whose
/// content looks like an object.
fn fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body_start = after
            .strip_prefix("json")
            .or_else(|| after.strip_prefix("JSON"))
            .unwrap_or(after);
        let close = body_start.find("```")?;
        let body = body_start[..close].trim();
        if body.starts_with('{') && body.ends_with('}') {
            return Some(body);
        }
        rest = &body_start[close + 3..];
    }
    None
}

/// First `{ ... }` substring with balanced braces, ignoring braces inside
/// JSON strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            return Some(&text[start..=end]);
        }
        search_from = start + 1;
    }
    None
}

fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
