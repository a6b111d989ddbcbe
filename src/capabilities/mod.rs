//! External collaborator capabilities.
//!
//! This module defines the abstract capabilities the pipeline depends on:
//!
//! - [`SearchCapability`]: paginated bibliographic search (Entrez E-utilities)
//! - [`FullTextCapability`]: per-article full-text retrieval (PubMed Central)
//! - [`QueryGenCapability`]: research idea -> query string generation
//! - [`AnalysisCapability`]: working-set synthesis
//!
//! Concrete implementations live in submodules; [`mock`] provides scripted
//! in-memory implementations for exercising the pipeline without network
//! access. New backends are added by implementing the matching trait and
//! wiring it into the session.

mod entrez;
mod gemini;
mod pmc;

pub mod mock;

pub use entrez::EntrezSearch;
pub use gemini::GeminiClient;
pub use pmc::PmcFullText;

use async_trait::async_trait;

use crate::models::Article;

/// Request-level filters a search capability may apply upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestFilter {
    /// Exclude records published on preprint servers
    ExcludePreprints,
    /// Only records with a free full-text copy
    FreeFullTextOnly,
}

/// Filter switches forwarded with every batch request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub exclude_preprints: bool,
    pub free_full_text_only: bool,
}

/// Publication date window forwarded with every batch request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// A single paginated request against the search capability
#[derive(Debug, Clone)]
pub struct BatchQuery {
    /// Query string, passed through verbatim
    pub query: String,

    /// Publication date window
    pub date_range: DateRange,

    /// Request-level filters
    pub filters: SearchFilters,

    /// Zero-based offset into the upstream result stream
    pub offset: usize,

    /// Number of records requested in this batch
    pub count: usize,
}

/// One page of results from the search capability
#[derive(Debug, Clone)]
pub struct BatchPage {
    /// Records in upstream relevance order
    pub articles: Vec<Article>,

    /// Total matching records upstream, independent of pagination
    pub total_available: usize,
}

/// Paginated bibliographic search
#[async_trait]
pub trait SearchCapability: Send + Sync + std::fmt::Debug {
    /// Fetch one batch of structured summaries
    async fn query(&self, request: &BatchQuery) -> Result<BatchPage, CapabilityError>;

    /// Whether a request-level filter is applied upstream.
    ///
    /// When this returns `false` the orchestrator filters client-side and
    /// compensates by requesting extra batches.
    fn supports_filter(&self, _filter: RequestFilter) -> bool {
        true
    }
}

/// Per-article full-text retrieval
#[async_trait]
pub trait FullTextCapability: Send + Sync + std::fmt::Debug {
    /// Fetch the expanded text for a PMCID
    async fn fetch(&self, pmcid: &str) -> Result<String, CapabilityError>;
}

/// Research idea -> search query generation
#[async_trait]
pub trait QueryGenCapability: Send + Sync + std::fmt::Debug {
    /// Turn a free-text research idea into a query string
    async fn generate(&self, idea: &str) -> Result<String, CapabilityError>;
}

/// Working-set synthesis
#[async_trait]
pub trait AnalysisCapability: Send + Sync + std::fmt::Debug {
    /// Synthesize across the given records; the result is an opaque text blob
    async fn synthesize(&self, articles: &[Article]) -> Result<String, CapabilityError>;
}

/// Errors surfaced by capability implementations
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// Rate limit exceeded (HTTP 429)
    #[error("rate limit exceeded")]
    RateLimit,

    /// Upstream temporarily unavailable (5xx)
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Upstream rejected the request outright (other 4xx, malformed query)
    #[error("upstream rejection: {0}")]
    Rejected(String),

    /// Payload could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The requested record has no retrievable content
    #[error("not available: {0}")]
    NotAvailable(String),
}

impl CapabilityError {
    /// Map an HTTP status into the error taxonomy
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            CapabilityError::RateLimit
        } else if status.is_server_error() {
            CapabilityError::Unavailable(format!("{} returned status {}", context, status))
        } else {
            CapabilityError::Rejected(format!("{} returned status {}", context, status))
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout
        } else {
            CapabilityError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        CapabilityError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for CapabilityError {
    fn from(err: quick_xml::DeError) -> Self {
        CapabilityError::Parse(format!("XML: {}", err))
    }
}
