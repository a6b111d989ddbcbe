//! Mock capabilities for exercising the pipeline without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::capabilities::{
    AnalysisCapability, BatchPage, BatchQuery, CapabilityError, FullTextCapability,
    QueryGenCapability, RequestFilter, SearchCapability,
};
use crate::models::{Article, ArticleBuilder};

/// A search capability backed by an in-memory corpus.
///
/// Pagination, filtering, and failure injection are scripted so orchestrator
/// behavior (batching, retry, compensation) can be asserted deterministically.
#[derive(Debug)]
pub struct MockSearch {
    corpus: Mutex<Vec<Article>>,
    /// Number of initial calls that fail with a transient error
    transient_failures: AtomicUsize,
    /// When set, every call fails with this permanent rejection
    rejection: Mutex<Option<String>>,
    /// When false, filters are NOT applied upstream and `supports_filter`
    /// reports them unsupported
    server_side_filters: bool,
    /// Artificial latency per call, for exercising in-flight behavior
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
}

impl MockSearch {
    /// Create a mock over the given corpus, filters applied server-side
    pub fn new(corpus: Vec<Article>) -> Self {
        Self {
            corpus: Mutex::new(corpus),
            transient_failures: AtomicUsize::new(0),
            rejection: Mutex::new(None),
            server_side_filters: true,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` calls with a transient network error
    pub fn failing_first(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Reject every call with a permanent upstream error
    pub fn rejecting(self, message: impl Into<String>) -> Self {
        self.set_rejection(message);
        self
    }

    /// Start (or stop, with `""`) rejecting calls after construction
    pub fn set_rejection(&self, message: impl Into<String>) {
        let message = message.into();
        *self.rejection.lock().expect("mock lock poisoned") =
            (!message.is_empty()).then_some(message);
    }

    /// Report request-level filters as unsupported, forcing client-side filtering
    pub fn without_server_filters(mut self) -> Self {
        self.server_side_filters = false;
        self
    }

    /// Sleep for the given duration at the start of every call
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total calls issued, including retried ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCapability for MockSearch {
    async fn query(&self, batch: &BatchQuery) -> Result<BatchPage, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.rejection.lock().expect("mock lock poisoned").clone() {
            return Err(CapabilityError::Rejected(message));
        }

        let remaining = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(CapabilityError::Network("injected failure".to_string()));
        }

        let corpus = self.corpus.lock().expect("mock lock poisoned");
        let matching: Vec<Article> = corpus
            .iter()
            .filter(|article| {
                if !self.server_side_filters {
                    return true;
                }
                if batch.filters.exclude_preprints && article.is_preprint() {
                    return false;
                }
                if batch.filters.free_full_text_only && article.pmcid.is_none() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        let total_available = matching.len();
        let articles = matching
            .into_iter()
            .skip(batch.offset)
            .take(batch.count)
            .collect();

        Ok(BatchPage {
            articles,
            total_available,
        })
    }

    fn supports_filter(&self, _filter: RequestFilter) -> bool {
        self.server_side_filters
    }
}

/// Scripted outcome for a single PMCID
#[derive(Debug, Clone)]
enum ScriptedFetch {
    Text(String),
    Timeout,
    Network,
}

/// A full-text capability with per-PMCID scripted outcomes.
///
/// PMCIDs without a script fail with `NotAvailable`.
#[derive(Debug, Default)]
pub struct MockFullText {
    scripts: Mutex<HashMap<String, ScriptedFetch>>,
    attempts: Mutex<Vec<String>>,
}

impl MockFullText {
    /// Create an empty mock (every fetch fails with `NotAvailable`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful fetch
    pub fn with_text(self, pmcid: impl Into<String>, text: impl Into<String>) -> Self {
        self.scripts
            .lock()
            .expect("mock lock poisoned")
            .insert(pmcid.into(), ScriptedFetch::Text(text.into()));
        self
    }

    /// Script a timeout
    pub fn with_timeout(self, pmcid: impl Into<String>) -> Self {
        self.scripts
            .lock()
            .expect("mock lock poisoned")
            .insert(pmcid.into(), ScriptedFetch::Timeout);
        self
    }

    /// Script a network failure
    pub fn with_network_error(self, pmcid: impl Into<String>) -> Self {
        self.scripts
            .lock()
            .expect("mock lock poisoned")
            .insert(pmcid.into(), ScriptedFetch::Network);
        self
    }

    /// PMCIDs that were attempted, in call order
    pub fn attempted(&self) -> Vec<String> {
        self.attempts.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl FullTextCapability for MockFullText {
    async fn fetch(&self, pmcid: &str) -> Result<String, CapabilityError> {
        self.attempts
            .lock()
            .expect("mock lock poisoned")
            .push(pmcid.to_string());

        let script = self
            .scripts
            .lock()
            .expect("mock lock poisoned")
            .get(pmcid)
            .cloned();

        match script {
            Some(ScriptedFetch::Text(text)) => Ok(text),
            Some(ScriptedFetch::Timeout) => Err(CapabilityError::Timeout),
            Some(ScriptedFetch::Network) => {
                Err(CapabilityError::Network("connection reset".to_string()))
            }
            None => Err(CapabilityError::NotAvailable(format!(
                "no script for {}",
                pmcid
            ))),
        }
    }
}

/// An analysis capability returning a canned result
#[derive(Debug, Default)]
pub struct MockAnalysis {
    result: Mutex<Option<String>>,
    failure: Mutex<Option<CapabilityErrorScript>>,
    synthesized_counts: Mutex<Vec<usize>>,
}

#[derive(Debug, Clone)]
enum CapabilityErrorScript {
    Rejected(String),
    Unavailable,
}

impl MockAnalysis {
    /// Return the given synthesis text on every call
    pub fn returning(result: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Some(result.into())),
            failure: Mutex::new(None),
            synthesized_counts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with a remote rejection carrying `message`
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(None),
            failure: Mutex::new(Some(CapabilityErrorScript::Rejected(message.into()))),
            synthesized_counts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call without a remote-provided message
    pub fn failing_without_message() -> Self {
        Self {
            result: Mutex::new(None),
            failure: Mutex::new(Some(CapabilityErrorScript::Unavailable)),
            synthesized_counts: Mutex::new(Vec::new()),
        }
    }

    /// Payload sizes of each synthesize call
    pub fn synthesized_counts(&self) -> Vec<usize> {
        self.synthesized_counts
            .lock()
            .expect("mock lock poisoned")
            .clone()
    }
}

#[async_trait]
impl AnalysisCapability for MockAnalysis {
    async fn synthesize(&self, articles: &[Article]) -> Result<String, CapabilityError> {
        self.synthesized_counts
            .lock()
            .expect("mock lock poisoned")
            .push(articles.len());

        if let Some(failure) = self.failure.lock().expect("mock lock poisoned").clone() {
            return Err(match failure {
                CapabilityErrorScript::Rejected(message) => CapabilityError::Rejected(message),
                CapabilityErrorScript::Unavailable => {
                    CapabilityError::Unavailable(String::new())
                }
            });
        }

        Ok(self
            .result
            .lock()
            .expect("mock lock poisoned")
            .clone()
            .unwrap_or_default())
    }
}

/// A query generator that echoes a canned query
#[derive(Debug)]
pub struct MockQueryGen {
    query: String,
}

impl MockQueryGen {
    /// Always generate the given query
    pub fn returning(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

#[async_trait]
impl QueryGenCapability for MockQueryGen {
    async fn generate(&self, _idea: &str) -> Result<String, CapabilityError> {
        Ok(self.query.clone())
    }
}

/// Helper to build a small test article
pub fn make_article(pmid: &str, title: &str) -> Article {
    ArticleBuilder::new(pmid, title)
        .authors("Jane Doe")
        .first_author("Doe, J.")
        .year(2021)
        .journal("Journal of Testing")
        .summary(format!("Abstract for {}", pmid))
        .build()
}
