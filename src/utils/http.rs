//! HTTP client utilities with built-in request pacing.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;

/// Shared HTTP client with sensible defaults and optional request pacing
///
/// Pacing matters for the NCBI E-utilities endpoints, which allow 3 requests
/// per second without an API key. Every request issued through this client
/// waits on the limiter before hitting the wire.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

/// Builder for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    user_agent: String,
    timeout: Duration,
    connect_timeout: Duration,
    requests_per_second: Option<NonZeroU32>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            requests_per_second: None,
        }
    }
}

impl HttpClientBuilder {
    /// Set the user agent string
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the total request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Throttle outgoing requests to at most `rps` per second (0 disables pacing)
    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = NonZeroU32::new(rps);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let limiter = self
            .requests_per_second
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(HttpClient { client, limiter })
    }
}

impl HttpClient {
    /// Create a client with default settings and no pacing
    pub fn new() -> Result<Self, reqwest::Error> {
        HttpClientBuilder::default().build()
    }

    /// Start building a customized client
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Issue a paced GET request
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.throttle().await;
        self.client.get(url).send().await
    }

    /// Issue a paced POST request with a JSON body
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.throttle().await;
        self.client.post(url).json(body).send().await
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// The underlying reqwest client (bypasses pacing)
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = HttpClient::new().unwrap();
        assert!(client.limiter.is_none());
    }

    #[test]
    fn test_zero_rps_disables_pacing() {
        let client = HttpClient::builder().requests_per_second(0).build().unwrap();
        assert!(client.limiter.is_none());

        let paced = HttpClient::builder().requests_per_second(3).build().unwrap();
        assert!(paced.limiter.is_some());
    }
}
