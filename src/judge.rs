//! Pairwise same-product judgment.
//!
//! The attribute rules settle most pairs. Only undecidable pairs reach the
//! search chain and the chat model, and every failure past that point
//! resolves to a conservative negative verdict.

use serde_json::json;
use tracing::{debug, warn};

use crate::attributes::ProductAttributes;
use crate::compare::compare;
use crate::config::{JudgeOptions, JUDGE_MAX_TOKENS};
use crate::llm::{LlmProvider, ProviderRequest};
use crate::search::{SearchChain, SearchSnippet};
use crate::verdict::MatchVerdict;

/// Fixed system directive for the judge model.
pub const JUDGE_SYSTEM: &str = "You are a strict plumbing SKU matching assistant.\n\
Compare two fittings and decide if they are the SAME product.\n\
Use only the evidence provided (descriptions + web snippets).\n\
Hard constraints: Material, Type, Angle, Sizes, Schedule, Ends must agree.\n\
If uncertain or conflicts exist, answer false.\n\
Respond ONLY with valid JSON matching keys:\n\
{\"same_product\": bool, \"confidence\": 0..1, \"blocking_reasons\": [str], \
\"key_attributes\": { ... }, \"best_supporting_urls\": [str]}";

/// Pairwise judge over injected model and search capabilities.
pub struct Judge {
    llm: Box<dyn LlmProvider>,
    search: SearchChain,
}

impl Judge {
    /// Creates a judge.
    pub fn new(llm: Box<dyn LlmProvider>, search: SearchChain) -> Self {
        Self { llm, search }
    }

    /// Decides whether `desc_a` and `desc_b` describe the same product.
    /// Never fails.
    pub fn judge_same_product(
        &self,
        desc_a: &str,
        desc_b: &str,
        options: JudgeOptions,
    ) -> MatchVerdict {
        let a = ProductAttributes::parse(desc_a);
        let b = ProductAttributes::parse(desc_b);

        let quick = compare(&a, &b);
        if quick.decidable {
            debug!(same = quick.same, reasons = ?quick.reasons, "attribute rules decided");
            return MatchVerdict::from_rules(quick.same, quick.reasons, a, b);
        }

        let snippets = if options.use_web {
            self.retrieve(&a, &b, options.max_snippets)
        } else {
            Vec::new()
        };

        let prompt = build_prompt(&a, &b, &snippets, options.max_snippets);
        let request = ProviderRequest {
            system: JUDGE_SYSTEM,
            prompt: &prompt,
            temperature: 0.0,
            max_tokens: JUDGE_MAX_TOKENS,
        };
        let text = match self.llm.complete(&request) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "judge model call failed");
                return MatchVerdict::fallback(a, b, &snippets);
            }
        };

        let decoded = MatchVerdict::from_model_output(&text, a.clone(), b.clone(), &snippets);
        decoded.unwrap_or_else(|| {
            warn!(response_len = text.len(), "judge model returned no usable verdict");
            MatchVerdict::fallback(a, b, &snippets)
        })
    }

    /// One query per description; the budget is split `max(1, n / 2)` and
    /// the remainder.
    fn retrieve(
        &self,
        a: &ProductAttributes,
        b: &ProductAttributes,
        max_snippets: usize,
    ) -> Vec<SearchSnippet> {
        let half = (max_snippets / 2).max(1);
        let mut snippets = self.search.search(&build_query(a), half);
        snippets.extend(
            self.search
                .search(&build_query(b), max_snippets.saturating_sub(half)),
        );
        snippets
    }
}

/// Search query built from the parsed attributes followed by the canonical
/// text.
pub fn build_query(attrs: &ProductAttributes) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(attrs.material.map(|m| m.as_str().to_string()));
    parts.extend(attrs.fitting_type.map(|t| t.as_str().to_string()));
    parts.extend(attrs.schedule.map(|s| s.as_str().to_string()));
    if !attrs.sizes.is_empty() {
        parts.push(attrs.sizes.join(" X "));
    }
    parts.extend(attrs.ends.iter().map(|end| end.as_str().to_string()));
    parts.push(attrs.canon.clone());
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_prompt(
    a: &ProductAttributes,
    b: &ProductAttributes,
    snippets: &[SearchSnippet],
    max_snippets: usize,
) -> String {
    let capped = &snippets[..snippets.len().min(max_snippets)];
    let snippets_json =
        serde_json::to_string_pretty(capped).unwrap_or_else(|_| "[]".to_string());
    format!(
        "A description: {}\nA parsed: {}\n\nB description: {}\nB parsed: {}\n\n\
Web snippets (title | url | snippet):\n{}\n\n\
Decide if A and B are the SAME product. Follow hard constraints.\nOutput JSON only.",
        a.raw,
        parsed_json(a),
        b.raw,
        parsed_json(b),
        snippets_json,
    )
}

fn parsed_json(attrs: &ProductAttributes) -> String {
    json!({
        "material": attrs.material,
        "type": attrs.fitting_type,
        "schedule": attrs.schedule,
        "angle_deg": attrs.angle_deg,
        "ends": attrs.ends,
        "sizes": attrs.sizes,
        "canon": attrs.canon,
    })
    .to_string()
}
