//! Query generation and synthesis capabilities backed by the Gemini API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::capabilities::{AnalysisCapability, CapabilityError, QueryGenCapability};
use crate::models::Article;
use crate::utils::HttpClient;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Per-article excerpt cap, keeps the synthesis prompt within model limits
const ARTICLE_EXCERPT_CHARS: usize = 3000;
/// Whole-prompt cap
const PROMPT_CHARS: usize = 30_000;

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(300);

const SYNTHESIS_HEADER: &str = "You are a research assistant. Synthesize research gaps \
from the provided articles into a concise list. For each gap, cite the source in \
parentheses (First Author, Year).\n\nExample:\n- The efficacy of treatment Y has not \
been tested in pediatric populations (Jones, 2021).\n\n--- START OF ARTICLES ---\n";

/// Gemini-backed query generation and synthesis
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Arc<HttpClient>,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new client for the given API key
    pub fn new(api_key: impl Into<String>) -> Result<Self, CapabilityError> {
        let client = HttpClient::builder().timeout(SYNTHESIS_TIMEOUT).build()?;
        Ok(Self::with_client(api_key, Arc::new(client)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(api_key: impl Into<String>, client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Use a different Gemini model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (for testing against a local server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url,
            self.model,
            urlencoding::encode(&self.api_key)
        )
    }

    async fn generate_content(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: Option<u32>,
    ) -> Result<String, CapabilityError> {
        let mut generation_config = json!({ "temperature": temperature });
        if let Some(max) = max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max);
        }

        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post_json(&self.endpoint(), &payload)
            .await
            .map_err(CapabilityError::from)?;

        let status = response.status();
        if !status.is_success() {
            // Gemini error bodies carry a useful message; surface it when present
            let body: Option<serde_json::Value> = response.json().await.ok();
            let message = body
                .as_ref()
                .and_then(|b| b["error"]["message"].as_str())
                .map(str::to_string);
            return Err(match message {
                Some(message) => CapabilityError::Rejected(message),
                None => CapabilityError::from_status(status, "Gemini"),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(CapabilityError::from)?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| {
                CapabilityError::Parse("no candidate text in Gemini response".to_string())
            })
    }

    /// Prompt for turning a research idea into a PubMed query
    fn query_prompt(idea: &str) -> String {
        format!(
            "Based on the user's research idea, create a concise and effective PubMed query. \
Instructions: 1. Identify key concepts. 2. Find synonyms. 3. Group with `OR` in parentheses, \
like `(concept[TIAB] OR synonym[TIAB])`. 4. Combine concepts with `AND`. 5. Confine search \
to title/abstract with `[TIAB]`. 6. Return ONLY the final query string. User's Idea: \"{}\" \
Example Output: ((\"air pollution\"[TIAB]) AND (\"asthma\"[TIAB]) AND (\"child\"[TIAB]))",
            idea
        )
    }

    /// Prompt for synthesizing research gaps across a working set
    ///
    /// Uses each article's full text when present, its abstract otherwise.
    fn synthesis_prompt(articles: &[Article]) -> String {
        let mut prompt = String::from(SYNTHESIS_HEADER);

        for (index, article) in articles.iter().enumerate() {
            let content = article.full_text.text().unwrap_or(&article.summary);
            prompt.push_str(&format!(
                "ARTICLE {} {}:\n{}...\n\n",
                index + 1,
                article.citation(),
                truncate_chars(content, ARTICLE_EXCERPT_CHARS)
            ));
        }

        truncate_chars(&prompt, PROMPT_CHARS).to_string()
    }
}

/// Truncate at a character boundary, never mid-codepoint
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl QueryGenCapability for GeminiClient {
    async fn generate(&self, idea: &str) -> Result<String, CapabilityError> {
        tracing::info!(idea_chars = idea.len(), "generating PubMed query");
        self.generate_content(&Self::query_prompt(idea), 0.2, None)
            .await
    }
}

#[async_trait]
impl AnalysisCapability for GeminiClient {
    async fn synthesize(&self, articles: &[Article]) -> Result<String, CapabilityError> {
        tracing::info!(articles = articles.len(), "synthesizing working set");
        self.generate_content(&Self::synthesis_prompt(articles), 0.3, Some(2048))
            .await
    }
}
