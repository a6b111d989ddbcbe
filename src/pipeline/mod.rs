//! Search and enrichment pipeline.
//!
//! The [`SearchOrchestrator`] aggregates chunked batches from the search
//! capability; the [`FullTextEnricher`] expands each record independently.
//! Both check the shared [`CancellationToken`] cooperatively.

mod enricher;
mod orchestrator;

pub use enricher::{FullTextEnricher, DEFAULT_ENRICHMENT_CONCURRENCY};
pub use orchestrator::SearchOrchestrator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::utils::ValidationError;

/// Cooperative cancellation token shared between a session and its in-flight
/// pipeline run.
///
/// Checked between orchestrator batches and before each enrichment call.
/// In-flight HTTP requests are allowed to complete.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token (not cancelled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Errors surfaced by a pipeline search run
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request failed validation; no network call was issued
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The search capability rejected the request outright
    #[error("upstream rejection: {0}")]
    Upstream(String),

    /// Transient failures persisted through every retry
    #[error("network failure after {attempts} attempts: {message}")]
    Network { message: String, attempts: u32 },

    /// Another pipeline run is already in flight for this session
    #[error("a search is already running")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
