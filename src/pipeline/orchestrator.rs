//! Chunked search aggregation against the search capability.

use std::collections::HashSet;
use std::sync::Arc;

use crate::capabilities::{
    BatchQuery, DateRange, RequestFilter, SearchCapability, SearchFilters,
};
use crate::models::{Article, SearchRequest};
use crate::pipeline::{CancellationToken, SearchError};
use crate::utils::{search_retry_config, with_retry_detailed, RetryConfig, RetryOutcome};

/// Issues chunked, retried, deduplicated requests against the search
/// capability and aggregates up to the requested limit.
///
/// Upstream relevance order is preserved; nothing is re-ranked.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    capability: Arc<dyn SearchCapability>,
    retry: RetryConfig,
}

impl SearchOrchestrator {
    /// Create an orchestrator with the default batch retry policy
    pub fn new(capability: Arc<dyn SearchCapability>) -> Self {
        Self {
            capability,
            retry: search_retry_config(),
        }
    }

    /// Override the per-batch retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Execute a search, aggregating batches until the limit is met, the
    /// source is exhausted, or cancellation is requested.
    ///
    /// Cancellation between batches returns the records aggregated so far
    /// rather than discarding progress. Batch failures abort the whole run
    /// and drop any partial aggregation.
    pub async fn execute(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Article>, SearchError> {
        request.validate()?;

        let filters = SearchFilters {
            exclude_preprints: request.exclude_preprints,
            free_full_text_only: request.free_full_text_only,
        };
        let date_range = DateRange {
            start: request.start_date.clone(),
            end: request.end_date.clone(),
        };

        // Filters the capability cannot apply upstream are compensated for
        // client-side: batches stay full-sized and extra ones are requested
        // until the post-filter count satisfies the limit.
        let filter_preprints_locally = request.exclude_preprints
            && !self.capability.supports_filter(RequestFilter::ExcludePreprints);
        let filter_free_full_text_locally = request.free_full_text_only
            && !self
                .capability
                .supports_filter(RequestFilter::FreeFullTextOnly);
        let compensating = filter_preprints_locally || filter_free_full_text_locally;

        let mut aggregated: Vec<Article> = Vec::with_capacity(request.limit);
        let mut seen: HashSet<String> = HashSet::with_capacity(request.limit);
        let mut offset = 0usize;
        let mut total_available: Option<usize> = None;

        while aggregated.len() < request.limit {
            if let Some(total) = total_available {
                if offset >= total {
                    break;
                }
            }

            if cancel.is_cancelled() {
                tracing::info!(
                    aggregated = aggregated.len(),
                    "search cancelled, returning partial result"
                );
                break;
            }

            let count = if compensating {
                request.chunk_size
            } else {
                request.chunk_size.min(request.limit - aggregated.len())
            };

            let batch = BatchQuery {
                query: request.query.clone(),
                date_range: date_range.clone(),
                filters,
                offset,
                count,
            };

            let outcome = with_retry_detailed(self.retry, || {
                let capability = Arc::clone(&self.capability);
                let batch = batch.clone();
                async move { capability.query(&batch).await }
            })
            .await;

            let page = match outcome {
                RetryOutcome::Success(page) => page,
                RetryOutcome::TransientExhausted(error, attempts) => {
                    tracing::warn!(%error, attempts, "search batch failed after retries");
                    return Err(SearchError::Network {
                        message: error.to_string(),
                        attempts,
                    });
                }
                RetryOutcome::Permanent(error) => {
                    tracing::warn!(%error, "search batch rejected upstream");
                    return Err(SearchError::Upstream(error.to_string()));
                }
            };

            total_available = Some(page.total_available);
            if page.articles.is_empty() {
                break;
            }
            offset += page.articles.len();

            for article in page.articles {
                if aggregated.len() >= request.limit {
                    break;
                }
                if filter_preprints_locally && article.is_preprint() {
                    continue;
                }
                if filter_free_full_text_locally && article.pmcid.is_none() {
                    continue;
                }
                // Retried batches can overlap; first occurrence wins
                if !seen.insert(article.pmid.clone()) {
                    tracing::debug!(pmid = %article.pmid, "dropping duplicate record");
                    continue;
                }
                aggregated.push(article);
            }
        }

        tracing::info!(
            records = aggregated.len(),
            limit = request.limit,
            "search aggregation complete"
        );

        Ok(aggregated)
    }
}
