//! Chat completion capability used by the judge.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Returns the raw completion text for `request`.
    fn complete(&self, request: &ProviderRequest) -> Result<String>;
}

/// Request envelope shared by the various providers.
pub struct ProviderRequest<'a> {
    /// Fixed system directive.
    pub system: &'a str,
    /// User turn.
    pub prompt: &'a str,
    /// Sampling temperature; the judge always sends 0.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: usize,
}

/// POSTs `body` and decodes a successful JSON reply. Non-2xx statuses
/// become errors carrying the response body.
fn post_json<B: Serialize, R: DeserializeOwned>(
    client: &Client,
    vendor: &str,
    endpoint: &str,
    body: &B,
) -> Result<R> {
    let resp = client
        .post(endpoint)
        .json(body)
        .send()
        .with_context(|| format!("failed to call {vendor} at {endpoint}"))?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        bail!("{} returned {}: {}", vendor, status, text);
    }
    resp.json()
        .with_context(|| format!("failed to parse {vendor} response"))
}
