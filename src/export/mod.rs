//! Export serialization for article working sets.
//!
//! Projects a configured field subset of the given records into JSON or CSV
//! byte content. Field order follows the configuration for both JSON key
//! emission and CSV columns.

use serde_json::{Map, Value};

use crate::models::{Article, ExportConfig, ExportField, ExportFormat};
use crate::utils::ValidationError;

/// A serialized export ready to hand to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Serialized content
    pub bytes: Vec<u8>,
    /// Suggested filename
    pub filename: String,
    /// MIME type of the content
    pub mime_type: &'static str,
}

/// Serialize the given records under the given configuration.
///
/// Errors on an empty record set before producing anything.
pub fn export(
    records: &[Article],
    config: &ExportConfig,
) -> Result<ExportArtifact, ValidationError> {
    if records.is_empty() {
        return Err(ValidationError::NothingToExport);
    }

    let bytes = match config.format {
        ExportFormat::Json => to_json(records, config),
        ExportFormat::Csv => to_csv(records, config),
    };

    let filename = format!(
        "litflow_export_{}.{}",
        chrono::Utc::now().format("%Y%m%d"),
        config.format.extension()
    );

    Ok(ExportArtifact {
        bytes,
        filename,
        mime_type: config.format.mime_type(),
    })
}

/// A field's JSON value for a record, or `None` when undefined for it.
///
/// Undefined fields (absent pmcid, full text that is not present) are
/// omitted from JSON objects rather than emitted as null.
fn json_value(article: &Article, field: ExportField) -> Option<Value> {
    match field {
        ExportField::Pmid => Some(Value::from(article.pmid.clone())),
        ExportField::Title => Some(Value::from(article.title.clone())),
        ExportField::Authors => Some(Value::from(article.authors.clone())),
        ExportField::FirstAuthor => Some(Value::from(article.first_author.clone())),
        ExportField::Year => Some(Value::from(article.year)),
        ExportField::Journal => Some(Value::from(article.journal.clone())),
        ExportField::Abstract => Some(Value::from(article.summary.clone())),
        ExportField::FullText => article.full_text.text().map(Value::from),
        ExportField::Pmcid => article.pmcid.clone().map(Value::from),
    }
}

/// A field's CSV cell text for a record; undefined fields export empty cells
fn csv_text(article: &Article, field: ExportField) -> String {
    match field {
        ExportField::Pmid => article.pmid.clone(),
        ExportField::Title => article.title.clone(),
        ExportField::Authors => article.authors.clone(),
        ExportField::FirstAuthor => article.first_author.clone(),
        ExportField::Year => article.year.to_string(),
        ExportField::Journal => article.journal.clone(),
        ExportField::Abstract => article.summary.clone(),
        ExportField::FullText => article.full_text.text().unwrap_or_default().to_string(),
        ExportField::Pmcid => article.pmcid.clone().unwrap_or_default(),
    }
}

fn to_json(records: &[Article], config: &ExportConfig) -> Vec<u8> {
    let rows: Vec<Value> = records
        .iter()
        .map(|article| {
            let mut object = Map::new();
            for field in config.included() {
                if let Some(value) = json_value(article, field) {
                    object.insert(field.name().to_string(), value);
                }
            }
            Value::Object(object)
        })
        .collect();

    // serde_json's pretty printer emits 2-space indentation
    serde_json::to_vec_pretty(&rows).expect("JSON values always serialize")
}

/// Wrap a CSV cell in double quotes, doubling any inner quotes
fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn to_csv(records: &[Article], config: &ExportConfig) -> Vec<u8> {
    let mut lines = Vec::with_capacity(records.len() + 1);

    lines.push(
        config
            .included()
            .map(|field| csv_quote(field.name()))
            .collect::<Vec<_>>()
            .join(","),
    );

    for article in records {
        lines.push(
            config
                .included()
                .map(|field| csv_quote(&csv_text(article, field)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    // rows separated by single newlines, no trailing blank line
    lines.join("\n").into_bytes()
}
