//! Defaults, credential lookup, and CLI arguments shared by the binaries.

use std::env;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::error::MatchError;

/// Default judge chat model.
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o-mini";
/// Default Anthropic judge model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
/// Upper bound on inputs per embeddings request.
pub const DEFAULT_EMBED_BATCH: usize = 2048;
/// Per-request timeout for search backends.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Entries kept in the in-process snippet cache.
pub const SNIPPET_CACHE_CAPACITY: usize = 256;
/// Judge output token budget.
pub const JUDGE_MAX_TOKENS: usize = 800;

/// Tunables for [`crate::judge::Judge::judge_same_product`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JudgeOptions {
    /// Retrieve web snippets before asking the model.
    pub use_web: bool,
    /// Total snippet budget across both descriptions.
    pub max_snippets: usize,
}

impl Default for JudgeOptions {
    fn default() -> Self {
        Self {
            use_web: true,
            max_snippets: 8,
        }
    }
}

/// Optional search credentials; a backend is enabled only when its keys
/// are present.
#[derive(Clone, Debug, Default)]
pub struct SearchKeys {
    /// `SERPAPI_KEY`.
    pub serpapi: Option<String>,
    /// `BING_SEARCH_KEY`.
    pub bing: Option<String>,
    /// `GOOGLE_API_KEY`.
    pub google_api_key: Option<String>,
    /// `GOOGLE_CSE_ID`.
    pub google_cse_id: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SearchKeys {
    /// Reads the search keys from the process environment.
    pub fn from_env() -> Self {
        Self {
            serpapi: optional_env("SERPAPI_KEY"),
            bing: optional_env("BING_SEARCH_KEY"),
            google_api_key: optional_env("GOOGLE_API_KEY"),
            google_cse_id: optional_env("GOOGLE_CSE_ID"),
            timeout: SEARCH_TIMEOUT,
        }
    }
}

/// Returns the trimmed value of `var`, or `None` when unset or blank.
pub fn optional_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns `value` when it is non-blank, otherwise a missing-credential
/// error naming `var`.
pub fn require_credential(value: Option<&str>, var: &'static str) -> Result<String, MatchError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(MatchError::MissingCredential { var })
}

/// Chat backend used by the judge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JudgeProvider {
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages API.
    Anthropic,
}

/// OpenAI connection settings shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "SKU_OPENAI_BASE", default_value = DEFAULT_OPENAI_BASE)]
    pub openai_base: String,

    /// HTTP timeout in seconds for model and embedding calls
    #[arg(long, env = "SKU_OPENAI_TIMEOUT_SECS", default_value_t = 60)]
    pub openai_timeout_secs: u64,

    /// Retries for rate-limited or failed requests
    #[arg(long, env = "SKU_OPENAI_MAX_RETRIES", default_value_t = 3)]
    pub openai_max_retries: usize,
}

impl OpenAiArgs {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs)
    }

    /// Total requests per batch: the first try plus the configured retries.
    pub fn max_attempts(&self) -> usize {
        self.openai_max_retries.saturating_add(1)
    }

    /// API key or a missing-credential error.
    pub fn require_key(&self) -> Result<String, MatchError> {
        require_credential(self.openai_api_key.as_deref(), "OPENAI_API_KEY")
    }
}
