//! Retrieval client: the "top-K documents for a query" capability.
//!
//! This crate provides:
//! - [`Retriever`]: the capability trait implemented by search backends
//! - [`RetrievalClient`]: timeout and retry policy around any retriever
//! - [`TavilyRetriever`]: HTTP backend for the Tavily search API

mod tavily;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use draftsmith_shared::{Document, DraftsmithError, RetrievalConfig, Result};

pub use tavily::TavilyRetriever;

/// Initial delay between retries; doubles on every attempt.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// The document-retrieval capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` ranked documents for `query`.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

/// A [`Retriever`] bound to a timeout and retry policy.
#[derive(Clone)]
pub struct RetrievalClient {
    retriever: Arc<dyn Retriever>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl RetrievalClient {
    /// Wrap a retriever using the settings from `[retrieval]`.
    pub fn new(retriever: Arc<dyn Retriever>, config: &RetrievalConfig) -> Self {
        Self {
            retriever,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Build a client backed by the Tavily HTTP backend.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        let backend = TavilyRetriever::from_config(config)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Override the initial retry delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Retrieve documents. An empty result is returned as-is; deciding
    /// whether it is usable belongs to the caller.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let mut attempt = 0;
        loop {
            match self.retrieve_once(query, k).await {
                Ok(docs) => {
                    debug!(query, k, returned = docs.len(), "retrieval complete");
                    return Ok(docs);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    attempt += 1;
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrieval failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delay before retry number `attempt + 1`. Saturates instead of
    /// overflowing for large retry budgets.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn retrieve_once(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        tokio::time::timeout(self.timeout, self.retriever.retrieve(query, k))
            .await
            .map_err(|_| {
                DraftsmithError::retrieval(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Flaky {
        failures_left: Mutex<u32>,
        queries: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Retriever for Flaky {
        async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
            self.queries.lock().unwrap().push((query.to_string(), k));
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(DraftsmithError::retrieval("502 bad gateway"));
            }
            Ok(vec![Document::new("https://a.example", "alpha")])
        }
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures_left: Mutex::new(failures),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn config(max_retries: u32) -> RetrievalConfig {
        RetrievalConfig {
            max_retries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn passes_query_and_k_through() {
        let backend = flaky(0);
        let client = RetrievalClient::new(backend.clone(), &config(0));

        let docs = client.retrieve("topic: AI", 10).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(
            backend.queries.lock().unwrap().as_slice(),
            &[("topic: AI".to_string(), 10)]
        );
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let backend = flaky(1);
        let client = RetrievalClient::new(backend.clone(), &config(1)).with_backoff(Duration::ZERO);

        let docs = client.retrieve("rust", 3).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(backend.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let backend = flaky(5);
        let client = RetrievalClient::new(backend.clone(), &config(2)).with_backoff(Duration::ZERO);

        let err = client.retrieve("rust", 3).await.unwrap_err();

        assert!(matches!(err, DraftsmithError::RetrievalFailure(_)));
        assert_eq!(backend.queries.lock().unwrap().len(), 3);
    }

    struct Stalled;

    #[async_trait]
    impl Retriever for Stalled {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Document>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn timeout_is_retrieval_failure() {
        let config = RetrievalConfig {
            timeout_secs: 0,
            max_retries: 0,
            ..Default::default()
        };
        let client = RetrievalClient::new(Arc::new(Stalled), &config);

        let err = client.retrieve("rust", 3).await.unwrap_err();
        assert!(matches!(err, DraftsmithError::RetrievalFailure(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn retry_delay_saturates_for_large_budgets() {
        let client = RetrievalClient::new(flaky(0), &config(64));
        assert_eq!(client.retry_delay(1), Duration::from_secs(1));
        assert_eq!(client.retry_delay(32), client.retry_delay(63));
    }
}
