//! Web evidence retrieval for the judge.
//!
//! Backends are tried in a fixed priority order and the first one that
//! returns at least one usable row wins. Provider failures are logged and
//! skipped; retrieval never fails from the caller's point of view.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use anyhow::Result;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SearchKeys;

pub mod providers;

pub use providers::{BingProvider, DuckDuckGoProvider, GoogleCseProvider, SerpApiProvider};

/// One retrieved search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    /// Result title.
    pub title: String,
    /// Result URL, never empty once clipped.
    pub url: String,
    /// Result summary text.
    pub snippet: String,
}

impl SearchSnippet {
    /// Convenience constructor.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A single web search backend.
pub trait SearchProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns raw rows for `query`. Callers clip the rows; implementations
    /// may return more than `k`.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchSnippet>>;
}

type SnippetCache = Mutex<LruCache<(String, usize), Vec<SearchSnippet>>>;

/// Ordered provider list with an optional in-process result cache.
pub struct SearchChain {
    providers: Vec<Box<dyn SearchProvider>>,
    cache: Option<SnippetCache>,
}

impl SearchChain {
    /// Builds a chain over `providers` in priority order. A zero
    /// `cache_capacity` disables caching.
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, cache_capacity: usize) -> Self {
        Self {
            providers,
            cache: build_cache(cache_capacity),
        }
    }

    /// Chain with no providers; every search returns nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Builds the default SerpAPI, Bing, Google CSE, DuckDuckGo chain,
    /// including keyed backends only when their credentials are present.
    pub fn from_keys(keys: &SearchKeys, cache_capacity: usize) -> Result<Self> {
        let timeout = keys.timeout;
        let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();
        if let Some(key) = &keys.serpapi {
            providers.push(Box::new(SerpApiProvider::new(key.clone(), timeout)?));
        }
        if let Some(key) = &keys.bing {
            providers.push(Box::new(BingProvider::new(key.clone(), timeout)?));
        }
        if let (Some(api_key), Some(cse_id)) = (&keys.google_api_key, &keys.google_cse_id) {
            providers.push(Box::new(GoogleCseProvider::new(
                api_key.clone(),
                cse_id.clone(),
                timeout,
            )?));
        }
        providers.push(Box::new(DuckDuckGoProvider::new(timeout)?));
        Ok(Self::new(providers, cache_capacity))
    }

    /// Names of the configured providers in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Returns at most `k` snippets from the first provider that yields any.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchSnippet> {
        if k == 0 || query.trim().is_empty() {
            return Vec::new();
        }
        let key = (query.to_string(), k);
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                if let Some(hit) = guard.get(&key) {
                    debug!(query, k, "search cache hit");
                    return hit.clone();
                }
            }
        }

        let rows = self.search_uncached(query, k);
        if !rows.is_empty() {
            if let Some(cache) = &self.cache {
                if let Ok(mut guard) = cache.lock() {
                    guard.put(key, rows.clone());
                }
            }
        }
        rows
    }

    fn search_uncached(&self, query: &str, k: usize) -> Vec<SearchSnippet> {
        for provider in &self.providers {
            match provider.search(query, k) {
                Ok(rows) => {
                    let clipped = clip_results(rows, k);
                    if !clipped.is_empty() {
                        debug!(provider = provider.name(), count = clipped.len(), "search hit");
                        return clipped;
                    }
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %format!("{err:#}"), "search provider failed");
                }
            }
        }
        Vec::new()
    }
}

/// Trims every field, drops rows without a URL or without both title and
/// snippet, and keeps the first `k` survivors.
pub fn clip_results(rows: Vec<SearchSnippet>, k: usize) -> Vec<SearchSnippet> {
    rows.into_iter()
        .filter_map(|row| {
            let title = row.title.trim();
            let url = row.url.trim();
            let snippet = row.snippet.trim();
            (!url.is_empty() && !(title.is_empty() && snippet.is_empty()))
                .then(|| SearchSnippet::new(title, url, snippet))
        })
        .take(k)
        .collect()
}

fn build_cache(size: usize) -> Option<SnippetCache> {
    NonZeroUsize::new(size).map(|capacity| Mutex::new(LruCache::new(capacity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing;

    impl SearchProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchSnippet>> {
            anyhow::bail!("connection refused")
        }
    }

    struct Fixed {
        rows: Vec<SearchSnippet>,
        calls: Arc<AtomicUsize>,
    }

    impl SearchProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchSnippet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }
    }

    fn fixed(rows: Vec<SearchSnippet>) -> (Box<dyn SearchProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Fixed {
                rows,
                calls: Arc::clone(&calls),
            }),
            calls,
        )
    }

    #[test]
    fn all_failing_providers_yield_nothing() {
        let chain = SearchChain::new(vec![Box::new(Failing), Box::new(Failing)], 8);
        assert!(chain.search("cpvc tee", 4).is_empty());
    }

    #[test]
    fn first_non_empty_provider_wins() {
        let (empty, empty_calls) = fixed(vec![SearchSnippet::new("", "https://a", "")]);
        let (full, full_calls) = fixed(vec![
            SearchSnippet::new("A", "https://a", "x"),
            SearchSnippet::new("B", "https://b", "y"),
        ]);
        let (later, later_calls) = fixed(vec![SearchSnippet::new("C", "https://c", "z")]);
        let chain = SearchChain::new(vec![Box::new(Failing), empty, full, later], 0);

        let rows = chain.search("q", 1);
        assert_eq!(rows, vec![SearchSnippet::new("A", "https://a", "x")]);
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
        assert_eq!(full_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cache_is_keyed_by_query_and_k() {
        let (provider, calls) = fixed(vec![SearchSnippet::new("A", "https://a", "x")]);
        let chain = SearchChain::new(vec![provider], 4);
        chain.search("q", 2);
        chain.search("q", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        chain.search("q", 3);
        chain.search("other", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_results_are_not_cached() {
        let (provider, calls) = fixed(Vec::new());
        let chain = SearchChain::new(vec![provider], 4);
        chain.search("q", 2);
        chain.search("q", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clipping_trims_and_filters() {
        let rows = vec![
            SearchSnippet::new("  title ", " https://a ", ""),
            SearchSnippet::new("no url", "   ", "text"),
            SearchSnippet::new("", "https://b", ""),
            SearchSnippet::new("", "https://c", "only snippet"),
            SearchSnippet::new("t", "https://d", "s"),
        ];
        let clipped = clip_results(rows, 2);
        assert_eq!(
            clipped,
            vec![
                SearchSnippet::new("title", "https://a", ""),
                SearchSnippet::new("", "https://c", "only snippet"),
            ]
        );
    }

    #[test]
    fn zero_k_skips_providers() {
        let (provider, calls) = fixed(vec![SearchSnippet::new("A", "https://a", "x")]);
        let chain = SearchChain::new(vec![provider], 0);
        assert!(chain.search("q", 0).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
