//! HTTP search backends.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use super::{SearchProvider, SearchSnippet};

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";
const BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";
const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Google CSE rejects `num` above this.
const GOOGLE_CSE_MAX_NUM: usize = 10;

fn build_client(name: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .with_context(|| format!("failed to build {name} HTTP client"))
}

fn fetch_json<T: DeserializeOwned>(name: &str, request: RequestBuilder) -> Result<T> {
    let resp = request
        .send()
        .with_context(|| format!("failed to call {name}"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        bail!("{} returned {}: {}", name, status, text);
    }
    resp.json()
        .with_context(|| format!("failed to parse {name} response"))
}

/// Reads an explicit `null` as the type's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// SerpAPI Google engine.
pub struct SerpApiProvider {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl SerpApiProvider {
    /// Creates a client against the public endpoint.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            endpoint: SERPAPI_ENDPOINT.to_string(),
            client: build_client("SerpAPI", timeout)?,
        })
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchSnippet>> {
        let num = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("engine", "google"),
            ("q", query),
            ("num", num.as_str()),
            ("api_key", self.api_key.trim()),
        ]);
        let parsed: SerpApiResponse = fetch_json("SerpAPI", request)?;
        Ok(parsed
            .organic_results
            .into_iter()
            .map(|item| SearchSnippet::new(item.title, item.link, item.snippet))
            .collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SerpApiResponse {
    #[serde(default, deserialize_with = "nullable")]
    organic_results: Vec<LinkItem>,
}

/// Title/link/snippet shape shared by SerpAPI and Google CSE.
#[derive(Debug, Default, Deserialize)]
struct LinkItem {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    link: String,
    #[serde(default, deserialize_with = "nullable")]
    snippet: String,
}

/// Bing Web Search v7.
pub struct BingProvider {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl BingProvider {
    /// Creates a client against the public endpoint.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            endpoint: BING_ENDPOINT.to_string(),
            client: build_client("Bing", timeout)?,
        })
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for BingProvider {
    fn name(&self) -> &str {
        "bing"
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchSnippet>> {
        let count = k.to_string();
        let request = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", self.api_key.trim())
            .query(&[
                ("q", query),
                ("count", count.as_str()),
                ("responseFilter", "Webpages"),
            ]);
        let parsed: BingResponse = fetch_json("Bing", request)?;
        Ok(parsed
            .web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .map(|item| SearchSnippet::new(item.name, item.url, item.snippet))
            .collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Default, Deserialize)]
struct BingWebPages {
    #[serde(default, deserialize_with = "nullable")]
    value: Vec<BingItem>,
}

#[derive(Debug, Default, Deserialize)]
struct BingItem {
    #[serde(default, deserialize_with = "nullable")]
    name: String,
    #[serde(default, deserialize_with = "nullable")]
    url: String,
    #[serde(default, deserialize_with = "nullable")]
    snippet: String,
}

/// Google Programmable Search (Custom Search JSON API).
pub struct GoogleCseProvider {
    api_key: String,
    cse_id: String,
    endpoint: String,
    client: Client,
}

impl GoogleCseProvider {
    /// Creates a client against the public endpoint.
    pub fn new(api_key: String, cse_id: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            cse_id,
            endpoint: GOOGLE_CSE_ENDPOINT.to_string(),
            client: build_client("Google CSE", timeout)?,
        })
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for GoogleCseProvider {
    fn name(&self) -> &str {
        "google_cse"
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchSnippet>> {
        let num = k.min(GOOGLE_CSE_MAX_NUM).to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("cx", self.cse_id.trim()),
            ("key", self.api_key.trim()),
            ("num", num.as_str()),
        ]);
        let parsed: GoogleCseResponse = fetch_json("Google CSE", request)?;
        Ok(parsed
            .items
            .into_iter()
            .map(|item| SearchSnippet::new(item.title, item.link, item.snippet))
            .collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct GoogleCseResponse {
    #[serde(default, deserialize_with = "nullable")]
    items: Vec<LinkItem>,
}

/// DuckDuckGo Instant Answer API. Needs no key.
pub struct DuckDuckGoProvider {
    endpoint: String,
    client: Client,
}

impl DuckDuckGoProvider {
    /// Creates a client against the public endpoint.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: DUCKDUCKGO_ENDPOINT.to_string(),
            client: build_client("DuckDuckGo", timeout)?,
        })
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn search(&self, query: &str, _k: usize) -> Result<Vec<SearchSnippet>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "json"),
            ("no_redirect", "1"),
            ("no_html", "1"),
        ]);
        let parsed: DuckDuckGoResponse = fetch_json("DuckDuckGo", request)?;
        Ok(parsed.into_snippets())
    }
}

#[derive(Debug, Default, Deserialize)]
struct DuckDuckGoResponse {
    #[serde(rename = "Results", default, deserialize_with = "nullable")]
    results: Vec<DuckDuckGoTopic>,
    #[serde(rename = "RelatedTopics", default, deserialize_with = "nullable")]
    related_topics: Vec<DuckDuckGoTopic>,
}

#[derive(Debug, Default, Deserialize)]
struct DuckDuckGoTopic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    #[serde(rename = "Topics", default, deserialize_with = "nullable")]
    topics: Vec<DuckDuckGoTopic>,
}

impl DuckDuckGoTopic {
    fn snippet(&self) -> Option<SearchSnippet> {
        let text = self.text.as_deref()?;
        let url = self.first_url.as_deref()?;
        Some(SearchSnippet::new(text, url, text))
    }
}

impl DuckDuckGoResponse {
    /// Direct results first, then related topics, each followed by its
    /// nested topics.
    fn into_snippets(self) -> Vec<SearchSnippet> {
        let mut rows: Vec<SearchSnippet> = self
            .results
            .iter()
            .filter_map(DuckDuckGoTopic::snippet)
            .collect();
        for topic in &self.related_topics {
            rows.extend(topic.snippet());
            rows.extend(topic.topics.iter().filter_map(DuckDuckGoTopic::snippet));
        }
        rows
    }
}
