//! Search request, export configuration, and analysis wire models.

use serde::{Deserialize, Serialize};

use crate::models::Article;
use crate::utils::ValidationError;

/// Earliest date accepted by the search backend when no range is given
pub const DEFAULT_START_DATE: &str = "1900/01/01";
/// Latest date accepted by the search backend when no range is given
pub const DEFAULT_END_DATE: &str = "3000/01/01";

/// Parameters for a pipeline search run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// PubMed query string
    pub query: String,

    /// Earliest publication date (YYYY/MM/DD)
    pub start_date: String,

    /// Latest publication date (YYYY/MM/DD)
    pub end_date: String,

    /// Total number of records to aggregate
    pub limit: usize,

    /// Records requested per upstream batch
    pub chunk_size: usize,

    /// Exclude preprint-server records
    pub exclude_preprints: bool,

    /// Only records with a free full-text copy
    pub free_full_text_only: bool,

    /// Attempt full-text enrichment after the search
    pub fetch_full_text: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            limit: 100,
            chunk_size: 50,
            exclude_preprints: true,
            free_full_text_only: false,
            fetch_full_text: false,
        }
    }
}

impl SearchRequest {
    /// Create a new request with defaults
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the publication date range
    pub fn date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    /// Set the total record limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the per-batch chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable/disable preprint exclusion
    pub fn exclude_preprints(mut self, exclude: bool) -> Self {
        self.exclude_preprints = exclude;
        self
    }

    /// Restrict to records with free full text
    pub fn free_full_text_only(mut self, free_only: bool) -> Self {
        self.free_full_text_only = free_only;
        self
    }

    /// Enable/disable full-text enrichment
    pub fn fetch_full_text(mut self, fetch: bool) -> Self {
        self.fetch_full_text = fetch;
        self
    }

    /// Check the request invariants before any network call is issued
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if self.limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if self.chunk_size == 0 {
            return Err(ValidationError::ZeroChunkSize);
        }
        if self.chunk_size > self.limit {
            return Err(ValidationError::ChunkExceedsLimit {
                chunk_size: self.chunk_size,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Exportable article fields, in canonical wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportField {
    Pmid,
    Title,
    Authors,
    FirstAuthor,
    Year,
    Journal,
    Abstract,
    FullText,
    Pmcid,
}

impl ExportField {
    /// Every field in canonical order
    pub const ALL: [ExportField; 9] = [
        ExportField::Pmid,
        ExportField::Title,
        ExportField::Authors,
        ExportField::FirstAuthor,
        ExportField::Year,
        ExportField::Journal,
        ExportField::Abstract,
        ExportField::FullText,
        ExportField::Pmcid,
    ];

    /// The column/key name this field exports under
    pub fn name(&self) -> &'static str {
        match self {
            ExportField::Pmid => "pmid",
            ExportField::Title => "title",
            ExportField::Authors => "authors",
            ExportField::FirstAuthor => "first_author",
            ExportField::Year => "year",
            ExportField::Journal => "journal",
            ExportField::Abstract => "abstract",
            ExportField::FullText => "full_text",
            ExportField::Pmcid => "pmcid",
        }
    }
}

/// Export output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// Field projection and format for an export
///
/// The declared field order is preserved in the output: JSON objects emit keys
/// in this order and CSV columns follow it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Ordered field -> included mapping
    pub fields: Vec<(ExportField, bool)>,

    /// Output format
    pub format: ExportFormat,
}

impl ExportConfig {
    /// All fields included, canonical order
    pub fn new(format: ExportFormat) -> Self {
        Self {
            fields: ExportField::ALL.iter().map(|&f| (f, true)).collect(),
            format,
        }
    }

    /// Only the given fields, in the given order
    pub fn with_fields(format: ExportFormat, fields: Vec<ExportField>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| (f, true)).collect(),
            format,
        }
    }

    /// Mark a field as excluded
    pub fn exclude(mut self, field: ExportField) -> Self {
        for entry in &mut self.fields {
            if entry.0 == field {
                entry.1 = false;
            }
        }
        self
    }

    /// Included fields in declared order
    pub fn included(&self) -> impl Iterator<Item = ExportField> + '_ {
        self.fields
            .iter()
            .filter(|(_, included)| *included)
            .map(|(field, _)| *field)
    }
}

/// Wire request for the synthesis capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Records to synthesize across
    pub articles: Vec<Article>,
}

/// Wire response from the synthesis capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Opaque synthesis text
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = SearchRequest::new("cancer[TIAB]");
        assert_eq!(request.limit, 100);
        assert_eq!(request.chunk_size, 50);
        assert!(request.exclude_preprints);
        assert!(!request.fetch_full_text);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            SearchRequest::new("  ").validate(),
            Err(ValidationError::EmptyQuery)
        );
        assert_eq!(
            SearchRequest::new("q").limit(0).validate(),
            Err(ValidationError::ZeroLimit)
        );
        assert_eq!(
            SearchRequest::new("q").chunk_size(0).validate(),
            Err(ValidationError::ZeroChunkSize)
        );
        assert_eq!(
            SearchRequest::new("q").limit(10).chunk_size(20).validate(),
            Err(ValidationError::ChunkExceedsLimit {
                chunk_size: 20,
                limit: 10
            })
        );
    }

    #[test]
    fn test_request_wire_shape_is_camel_case() {
        let request = SearchRequest::new("q").limit(10).chunk_size(5);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["chunkSize"], 5);
        assert_eq!(json["excludePreprints"], true);
        assert!(json.get("startDate").is_some());
    }

    #[test]
    fn test_export_config_included_order() {
        let config = ExportConfig::new(ExportFormat::Json)
            .exclude(ExportField::Abstract)
            .exclude(ExportField::FullText);

        let names: Vec<_> = config.included().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "pmid",
                "title",
                "authors",
                "first_author",
                "year",
                "journal",
                "pmcid"
            ]
        );
    }

    #[test]
    fn test_with_fields_preserves_declared_order() {
        let config =
            ExportConfig::with_fields(ExportFormat::Csv, vec![ExportField::Year, ExportField::Title]);
        let names: Vec<_> = config.included().map(|f| f.name()).collect();
        assert_eq!(names, vec!["year", "title"]);
    }
}
