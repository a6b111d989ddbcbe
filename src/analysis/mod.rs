//! Forwarding of selected records to the synthesis capability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capabilities::{AnalysisCapability, CapabilityError};
use crate::models::Article;
use crate::utils::ValidationError;

/// Fallback when the synthesis capability fails without a usable message
const GENERIC_FAILURE_MESSAGE: &str = "the analysis service did not return a usable response";

/// Errors surfaced by an analysis request
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The request failed validation; no network call was issued
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An analysis call is already outstanding for this session
    #[error("an analysis is already running")]
    Busy,

    /// The synthesis capability failed; carries the remote message when one
    /// was provided
    #[error("analysis failed: {0}")]
    Remote(String),
}

/// Forwards record batches to the synthesis capability.
///
/// At most one analysis call is outstanding at a time; the result is treated
/// as an opaque text blob.
#[derive(Debug)]
pub struct AnalysisDispatcher {
    capability: Arc<dyn AnalysisCapability>,
    in_flight: AtomicBool,
}

impl AnalysisDispatcher {
    /// Create a dispatcher over the given capability
    pub fn new(capability: Arc<dyn AnalysisCapability>) -> Self {
        Self {
            capability,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Submit the given records for synthesis
    pub async fn analyze(&self, records: &[Article]) -> Result<String, AnalysisError> {
        if records.is_empty() {
            return Err(ValidationError::NothingToAnalyze.into());
        }

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AnalysisError::Busy);
        }

        tracing::info!(records = records.len(), "dispatching analysis request");
        let result = self.capability.synthesize(records).await;
        self.in_flight.store(false, Ordering::SeqCst);

        result.map_err(|error| AnalysisError::Remote(remote_message(error)))
    }
}

/// Extract the remote-provided message, falling back to a generic one
fn remote_message(error: CapabilityError) -> String {
    match error {
        CapabilityError::Rejected(message)
        | CapabilityError::Unavailable(message)
        | CapabilityError::Network(message)
            if !message.trim().is_empty() =>
        {
            message
        }
        _ => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}
