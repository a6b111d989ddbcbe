//! Per-record full-text enrichment with bounded concurrency.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::capabilities::{CapabilityError, FullTextCapability};
use crate::models::{Article, FullText, FullTextFailure};
use crate::pipeline::CancellationToken;
use crate::utils::{single_attempt, with_retry, RetryConfig};

/// Default number of concurrent full-text fetches
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 5;

/// Attempts full-text retrieval for each record independently.
///
/// One record's failure never affects another's attempt, and the whole pass
/// never fails: failures are recorded in each record's `full_text` state.
/// Workers run concurrently up to a bound, but output order always equals
/// input order.
#[derive(Debug, Clone)]
pub struct FullTextEnricher {
    capability: Arc<dyn FullTextCapability>,
    concurrency: usize,
    retry: RetryConfig,
}

impl FullTextEnricher {
    /// Create an enricher with the default concurrency and a single attempt
    /// per record
    pub fn new(capability: Arc<dyn FullTextCapability>) -> Self {
        Self {
            capability,
            concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            retry: single_attempt(),
        }
    }

    /// Override the concurrency bound (clamped to at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Inject a retry policy for per-record fetches
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enrich every record. When disabled, no network calls occur and
    /// `full_text` states are left untouched.
    pub async fn enrich(
        &self,
        records: Vec<Article>,
        enabled: bool,
        cancel: &CancellationToken,
    ) -> Vec<Article> {
        if !enabled || records.is_empty() {
            return records;
        }

        // `buffered` polls up to `concurrency` fetches at once but yields in
        // input order, so completion order never leaks into the output.
        stream::iter(
            records
                .into_iter()
                .map(|article| self.enrich_one(article, cancel)),
        )
        .buffered(self.concurrency)
        .collect()
        .await
    }

    async fn enrich_one(&self, mut article: Article, cancel: &CancellationToken) -> Article {
        if cancel.is_cancelled() {
            return article;
        }

        // An already-decided state is never overwritten by a later pass
        if article.full_text.is_decided() {
            return article;
        }

        let Some(pmcid) = article.pmcid.clone() else {
            article.full_text = FullText::failed(FullTextFailure::NotAvailable);
            return article;
        };

        let capability = Arc::clone(&self.capability);
        let outcome = with_retry(self.retry, || {
            let capability = Arc::clone(&capability);
            let pmcid = pmcid.clone();
            async move { capability.fetch(&pmcid).await }
        })
        .await;

        article.full_text = match outcome {
            Ok(text) if text.trim().is_empty() => FullText::failed(FullTextFailure::Empty),
            Ok(text) => FullText::present(text),
            Err(error) => {
                tracing::debug!(pmid = %article.pmid, %error, "full-text fetch failed");
                FullText::failed(failure_reason(&error))
            }
        };

        article
    }
}

/// Map a capability error onto a per-record failure code
fn failure_reason(error: &CapabilityError) -> FullTextFailure {
    match error {
        CapabilityError::Timeout => FullTextFailure::Timeout,
        CapabilityError::RateLimit => FullTextFailure::RateLimited,
        CapabilityError::Network(_) => FullTextFailure::Network,
        CapabilityError::Unavailable(_) | CapabilityError::Rejected(_) => FullTextFailure::Upstream,
        CapabilityError::Parse(_) => FullTextFailure::Parse,
        CapabilityError::NotAvailable(_) => FullTextFailure::NotAvailable,
    }
}
