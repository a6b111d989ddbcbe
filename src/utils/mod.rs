//! Utility modules supporting the pipeline.
//!
//! - [`HttpClient`]: HTTP client with built-in request pacing
//! - [`RetryConfig`] / [`with_retry`] / [`with_retry_detailed`]: bounded
//!   retries with exponential backoff for transient upstream failures
//! - [`ValidationError`]: synchronous request/selection validation failures

mod http;
mod retry;
mod validate;

pub use http::{HttpClient, HttpClientBuilder};
pub use retry::{
    is_transient, search_retry_config, single_attempt, with_retry, with_retry_detailed,
    RetryConfig, RetryOutcome,
};
pub use validate::ValidationError;
