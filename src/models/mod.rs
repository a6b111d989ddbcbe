//! Core data models for articles, search requests, and exports.

mod article;
mod request;

pub use article::{Article, ArticleBuilder, FullText, FullTextFailure};
pub use request::{
    AnalyzeRequest, AnalyzeResponse, ExportConfig, ExportField, ExportFormat, SearchRequest,
    DEFAULT_END_DATE, DEFAULT_START_DATE,
};
