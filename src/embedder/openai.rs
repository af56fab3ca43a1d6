//! OpenAI-compatible embeddings client.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Embedder;

/// Longest single backoff is `BASE_BACKOFF_MS * 2^MAX_BACKOFF_SHIFT`.
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_SHIFT: u32 = 5;

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
///
/// Inputs longer than the batch limit are split into consecutive requests
/// whose results are concatenated in order.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_attempts: usize,
    batch_size: usize,
}

/// Result of a single request.
enum Attempt {
    Done(Vec<Vec<f32>>),
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl OpenAiEmbedder {
    /// Builds a client for `{base_url}/embeddings`. `max_attempts` counts
    /// the first request.
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
        max_attempts: usize,
        batch_size: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(batch_size > 0, "embedding batch size must be positive");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embeddings HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            max_attempts: max_attempts.max(1),
            batch_size,
        })
    }

    /// Maximum inputs per request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embeds at most `batch_size` inputs in one request, retrying rate
    /// limits, server errors, and timeouts with exponential backoff.
    pub fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            inputs.len() <= self.batch_size,
            "batch of {} exceeds configured max {}",
            inputs.len(),
            self.batch_size
        );

        let mut attempt = 1;
        loop {
            match self.send(inputs) {
                Attempt::Done(vectors) => return Ok(vectors),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Transient(err) if attempt >= self.max_attempts => {
                    return Err(err.context(format!("gave up after {attempt} attempts")))
                }
                Attempt::Transient(err) => {
                    let wait = backoff(attempt);
                    warn!(error = %format!("{err:#}"), attempt, wait_ms = wait.as_millis() as u64, "retrying embeddings request");
                    thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }

    fn send(&self, inputs: &[&str]) -> Attempt {
        let body = EmbeddingBody {
            model: &self.model,
            input: inputs,
        };
        let resp = match self.client.post(&self.endpoint).json(&body).send() {
            Ok(resp) => resp,
            Err(err) if err.is_timeout() || err.is_connect() => {
                return Attempt::Transient(anyhow!(err).context("embeddings request failed"))
            }
            Err(err) => return Attempt::Fatal(anyhow!(err).context("embeddings request failed")),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            let err = anyhow!("embeddings endpoint returned {status}: {text}");
            return if is_transient(status) {
                Attempt::Transient(err)
            } else {
                Attempt::Fatal(err)
            };
        }

        match resp.json::<EmbeddingReply>() {
            Ok(reply) => match reply.into_vectors(inputs.len()) {
                Ok(vectors) => Attempt::Done(vectors),
                Err(err) => Attempt::Fatal(err),
            },
            Err(err) => Attempt::Fatal(anyhow!(err).context("failed to parse embeddings response")),
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            debug!(inputs = chunk.len(), model = %self.model, "requesting embeddings");
            vectors.extend(self.embed_batch(chunk)?);
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: usize) -> Duration {
    let shift = (attempt as u32).min(MAX_BACKOFF_SHIFT);
    Duration::from_millis(BASE_BACKOFF_MS << shift)
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingReply {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingReply {
    /// Vectors in input order.
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        anyhow::ensure!(
            self.data.len() == expected,
            "embedding service returned {} vectors for {} inputs",
            self.data.len(),
            expected
        );
        self.data.sort_by_key(|row| row.index);
        Ok(self.data.into_iter().map(|row| row.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(max_attempts: usize, batch_size: usize) -> Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(
            "sk-test".into(),
            "http://127.0.0.1:9/v1/",
            "text-embedding-3-small".into(),
            Duration::from_millis(200),
            max_attempts,
            batch_size,
        )
    }

    #[test]
    fn validates_construction() {
        assert!(OpenAiEmbedder::new(
            "".into(),
            "https://api.openai.com/v1",
            "m".into(),
            Duration::from_secs(1),
            1,
            8
        )
        .is_err());
        assert!(client(1, 0).is_err());
        let embedder = client(0, 8).unwrap();
        assert_eq!(embedder.endpoint, "http://127.0.0.1:9/v1/embeddings");
        assert_eq!(embedder.max_attempts, 1);
        assert_eq!(embedder.model(), "text-embedding-3-small");
    }

    #[test]
    fn empty_input_needs_no_request() {
        let embedder = client(1, 8).unwrap();
        assert!(embedder.embed(&[]).unwrap().is_empty());
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let embedder = client(1, 2).unwrap();
        assert!(embedder.embed_batch(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(2), Duration::from_millis(2000));
        assert_eq!(backoff(9), backoff(5));
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn reply_rows_follow_index_order() {
        let reply: EmbeddingReply = serde_json::from_str(
            r#"{"data": [{"embedding": [2.0], "index": 1}, {"embedding": [1.0], "index": 0}]}"#,
        )
        .unwrap();
        assert_eq!(reply.into_vectors(2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn reply_count_mismatch_is_an_error() {
        let reply: EmbeddingReply =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0], "index": 0}]}"#).unwrap();
        assert!(reply.into_vectors(2).is_err());
    }
}
