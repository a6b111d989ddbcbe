//! Input validation for search requests and store-derived operations.
//!
//! Validation failures are synchronous and block the requested action before
//! any network call is issued.

use thiserror::Error;

/// Validation error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("search query must not be empty")]
    EmptyQuery,

    #[error("research idea must not be empty")]
    EmptyIdea,

    #[error("limit must be greater than zero")]
    ZeroLimit,

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk size {chunk_size} exceeds limit {limit}")]
    ChunkExceedsLimit { chunk_size: usize, limit: usize },

    #[error("no articles selected")]
    EmptySelection,

    #[error("no articles to export")]
    NothingToExport,

    #[error("no articles to analyze")]
    NothingToAnalyze,

    #[error("no articles to trash")]
    NothingToTrash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::EmptySelection.to_string(),
            "no articles selected"
        );
        assert_eq!(
            ValidationError::ChunkExceedsLimit {
                chunk_size: 60,
                limit: 50
            }
            .to_string(),
            "chunk size 60 exceeds limit 50"
        );
    }
}
