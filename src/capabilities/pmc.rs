//! Full-text capability that extracts article body text from PubMed Central pages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::capabilities::{CapabilityError, FullTextCapability};
use crate::utils::HttpClient;

const PMC_ARTICLE_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles/";

/// PMC serves article pages to browsers; a bare library user agent gets blocked
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

const PMC_REQUESTS_PER_SECOND: u32 = 3;
const PMC_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// PMC full-text capability
///
/// Fetches the article page for a PMCID and extracts the paragraph text of
/// the `aria-label="Article content"` container.
#[derive(Debug, Clone)]
pub struct PmcFullText {
    client: Arc<HttpClient>,
    base_url: String,
}

impl PmcFullText {
    /// Create a new capability with a paced, browser-identifying HTTP client
    pub fn new() -> Result<Self, CapabilityError> {
        let client = HttpClient::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(PMC_FETCH_TIMEOUT)
            .requests_per_second(PMC_REQUESTS_PER_SECOND)
            .build()?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            base_url: PMC_ARTICLE_URL.to_string(),
        }
    }

    /// Override the article base URL (for testing against a local server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Normalize a PMCID into the "PMC0000000" page-path form
    fn normalize_pmcid(pmcid: &str) -> String {
        let digits = pmcid.trim().trim_start_matches("PMC");
        format!("PMC{}", digits)
    }

    /// Extract the article body paragraphs from a PMC page
    fn extract_body(html: &str) -> Result<String, CapabilityError> {
        let container_selector = Selector::parse(r#"[aria-label="Article content"]"#)
            .map_err(|e| CapabilityError::Parse(format!("selector: {}", e)))?;
        let paragraph_selector = Selector::parse("p")
            .map_err(|e| CapabilityError::Parse(format!("selector: {}", e)))?;

        let document = Html::parse_document(html);

        let Some(container) = document.select(&container_selector).next() else {
            return Err(CapabilityError::NotAvailable(
                "article content container not found".to_string(),
            ));
        };

        let text = container
            .select(&paragraph_selector)
            .map(|p| {
                p.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|paragraph| !paragraph.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(text)
    }
}

#[async_trait]
impl FullTextCapability for PmcFullText {
    async fn fetch(&self, pmcid: &str) -> Result<String, CapabilityError> {
        let id = Self::normalize_pmcid(pmcid);
        let url = format!("{}{}/", self.base_url, id);

        tracing::debug!(%id, "fetching PMC full text");

        let response = self.client.get(&url).await.map_err(CapabilityError::from)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CapabilityError::NotAvailable(format!(
                "no PMC page for {}",
                id
            )));
        }
        if !status.is_success() {
            return Err(CapabilityError::from_status(status, "PMC"));
        }

        let html = response.text().await.map_err(CapabilityError::from)?;
        Self::extract_body(&html)
    }
}
