//! Tavily search API backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use draftsmith_shared::{Document, DraftsmithError, RetrievalConfig, Result, api_key_from_env};

use crate::Retriever;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Draftsmith/", env!("CARGO_PKG_VERSION"));

/// [`Retriever`] backed by `POST {base_url}/search`.
#[derive(Debug, Clone)]
pub struct TavilyRetriever {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl TavilyRetriever {
    /// Create a backend for `base_url` (e.g. `https://api.tavily.com`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| DraftsmithError::config(format!("invalid retrieval base_url '{base_url}': {e}")))?;
        let endpoint = base
            .join("search")
            .map_err(|e| DraftsmithError::config(format!("invalid retrieval endpoint: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DraftsmithError::retrieval(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Create a backend from `[retrieval]`, reading the key from its env var.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::new(&config.base_url, api_key, config.timeout())
    }
}

#[async_trait]
impl Retriever for TavilyRetriever {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: k,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| DraftsmithError::retrieval(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DraftsmithError::retrieval(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            DraftsmithError::retrieval(format!("failed to parse search response: {e}"))
        })?;

        let total = parsed.results.len();
        let docs: Vec<Document> = parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(k)
            .map(|r| Document {
                source: r.url,
                content: r.content,
                title: r.title,
                score: r.score,
            })
            .collect();

        debug!(total, kept = docs.len(), "search results mapped");
        Ok(docs)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}
