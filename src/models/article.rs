//! Article model representing a bibliographic record in the working set.

use serde::{Deserialize, Serialize};

/// Reason codes for a failed full-text enrichment attempt.
///
/// These are short machine-readable codes, never free-form error dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullTextFailure {
    /// The record has no PMCID, so there is no full-text source to try
    NotAvailable,
    /// The fetch timed out
    Timeout,
    /// The full-text host rate-limited the request
    RateLimited,
    /// Connection-level failure
    Network,
    /// The host rejected the request or served an error page
    Upstream,
    /// The page was fetched but the article body could not be extracted
    Parse,
    /// Extraction succeeded but yielded no text
    Empty,
}

impl FullTextFailure {
    /// The wire code for this failure reason
    pub fn code(&self) -> &'static str {
        match self {
            FullTextFailure::NotAvailable => "not_available",
            FullTextFailure::Timeout => "timeout",
            FullTextFailure::RateLimited => "rate_limited",
            FullTextFailure::Network => "network",
            FullTextFailure::Upstream => "upstream",
            FullTextFailure::Parse => "parse",
            FullTextFailure::Empty => "empty",
        }
    }
}

impl std::fmt::Display for FullTextFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Outcome of full-text enrichment for a single article.
///
/// Modeled as a tagged variant rather than sentinel string prefixes, so
/// callers match on structure instead of inspecting text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FullText {
    /// Enrichment was not requested for this record
    NotAttempted,
    /// Enrichment was attempted and failed
    Failed { reason: FullTextFailure },
    /// Enrichment succeeded
    Present { text: String },
}

impl FullText {
    /// Construct a successful enrichment outcome
    pub fn present(text: impl Into<String>) -> Self {
        FullText::Present { text: text.into() }
    }

    /// Construct a failed enrichment outcome
    pub fn failed(reason: FullTextFailure) -> Self {
        FullText::Failed { reason }
    }

    /// The enriched text, if present
    pub fn text(&self) -> Option<&str> {
        match self {
            FullText::Present { text } => Some(text),
            _ => None,
        }
    }

    /// Whether an enrichment attempt has already been decided for this record
    pub fn is_decided(&self) -> bool {
        !matches!(self, FullText::NotAttempted)
    }
}

impl Default for FullText {
    fn default() -> Self {
        FullText::NotAttempted
    }
}

/// Journal names that identify preprint servers rather than journals.
///
/// Used when the search capability cannot exclude preprints upstream and the
/// orchestrator has to filter client-side.
const PREPRINT_SERVERS: &[&str] = &[
    "biorxiv",
    "medrxiv",
    "arxiv",
    "research square",
    "ssrn",
    "preprints.org",
];

/// A bibliographic record from the literature search pipeline
///
/// Field order matches the wire shape: `pmid, title, authors, first_author,
/// year, journal, abstract, full_text, pmcid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Unique PubMed identifier
    pub pmid: String,

    /// Article title
    pub title: String,

    /// Authors in citation order (semicolon-separated display string)
    pub authors: String,

    /// First author in "Lastname, F." display form
    pub first_author: String,

    /// Publication year (0 when the source gives none)
    pub year: i32,

    /// Journal title
    pub journal: String,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub summary: String,

    /// Full-text enrichment outcome
    #[serde(default)]
    pub full_text: FullText,

    /// PubMed Central identifier, when the article has a full-text record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
}

impl Article {
    /// Create a new article with required fields
    pub fn new(pmid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            title: title.into(),
            authors: String::new(),
            first_author: String::new(),
            year: 0,
            journal: String::new(),
            summary: String::new(),
            full_text: FullText::NotAttempted,
            pmcid: None,
        }
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Inline citation in "(First Author, Year)" form
    pub fn citation(&self) -> String {
        format!("({}, {})", self.first_author, self.year)
    }

    /// Whether the journal field names a known preprint server
    pub fn is_preprint(&self) -> bool {
        let journal = self.journal.to_lowercase();
        PREPRINT_SERVERS.iter().any(|name| journal.contains(name))
    }
}

/// Builder for constructing Article objects
#[derive(Debug, Clone)]
pub struct ArticleBuilder {
    article: Article,
}

impl ArticleBuilder {
    /// Create a new builder with required fields
    pub fn new(pmid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            article: Article::new(pmid, title),
        }
    }

    /// Set authors display string
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.article.authors = authors.into();
        self
    }

    /// Set first-author display form
    pub fn first_author(mut self, first_author: impl Into<String>) -> Self {
        self.article.first_author = first_author.into();
        self
    }

    /// Set publication year
    pub fn year(mut self, year: i32) -> Self {
        self.article.year = year;
        self
    }

    /// Set journal title
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.article.journal = journal.into();
        self
    }

    /// Set abstract text
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.article.summary = summary.into();
        self
    }

    /// Set PMCID
    pub fn pmcid(mut self, pmcid: impl Into<String>) -> Self {
        self.article.pmcid = Some(pmcid.into());
        self
    }

    /// Set full-text state
    pub fn full_text(mut self, full_text: FullText) -> Self {
        self.article.full_text = full_text;
        self
    }

    /// Build the Article
    pub fn build(self) -> Article {
        self.article
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_builder() {
        let article = ArticleBuilder::new("12345678", "Soil microbiome dynamics")
            .authors("Jane Doe; John Smith")
            .first_author("Doe, J.")
            .year(2021)
            .journal("Nature Microbiology")
            .summary("We study the soil microbiome.")
            .pmcid("PMC7654321")
            .build();

        assert_eq!(article.pmid, "12345678");
        assert_eq!(article.first_author, "Doe, J.");
        assert_eq!(article.pmcid.as_deref(), Some("PMC7654321"));
        assert_eq!(article.full_text, FullText::NotAttempted);
    }

    #[test]
    fn test_author_list() {
        let article = ArticleBuilder::new("1", "Test")
            .authors("Jane Doe; John Smith; Bob Jones")
            .build();

        assert_eq!(
            article.author_list(),
            vec!["Jane Doe", "John Smith", "Bob Jones"]
        );
    }

    #[test]
    fn test_citation() {
        let article = ArticleBuilder::new("1", "Test")
            .first_author("Doe, J.")
            .year(2021)
            .build();

        assert_eq!(article.citation(), "(Doe, J., 2021)");
    }

    #[test]
    fn test_preprint_detection() {
        let preprint = ArticleBuilder::new("1", "Test").journal("bioRxiv").build();
        let journal = ArticleBuilder::new("2", "Test")
            .journal("The Lancet")
            .build();

        assert!(preprint.is_preprint());
        assert!(!journal.is_preprint());
    }

    #[test]
    fn test_full_text_wire_shape() {
        let failed = FullText::failed(FullTextFailure::Timeout);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");

        let present = FullText::present("body text");
        let json = serde_json::to_value(&present).unwrap();
        assert_eq!(json["status"], "present");
        assert_eq!(json["text"], "body text");
    }

    #[test]
    fn test_article_serializes_abstract_key() {
        let article = ArticleBuilder::new("1", "Test")
            .summary("An abstract.")
            .build();
        let json = serde_json::to_value(&article).unwrap();

        assert_eq!(json["abstract"], "An abstract.");
        // absent pmcid is omitted, not null
        assert!(json.get("pmcid").is_none());
    }
}
