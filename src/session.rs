//! Session context owning the working set and the pipeline wiring.
//!
//! A [`Session`] is the single orchestrating workflow: it owns the
//! [`LifecycleStore`], the busy flag that keeps pipeline runs exclusive, and
//! the cancellation token for the in-flight run. Callers invoke methods and
//! get result values back; there are no ambient globals and no callback
//! passing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::analysis::{AnalysisDispatcher, AnalysisError};
use crate::capabilities::{
    AnalysisCapability, CapabilityError, FullTextCapability, QueryGenCapability, SearchCapability,
};
use crate::export::{export, ExportArtifact};
use crate::models::{Article, ExportConfig, SearchRequest};
use crate::pipeline::{CancellationToken, FullTextEnricher, SearchError, SearchOrchestrator};
use crate::store::LifecycleStore;
use crate::utils::ValidationError;

/// Outcome of a completed pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    /// Records aggregated by the orchestrator
    pub fetched: usize,
    /// Records seeded into the active set (after trash suppression)
    pub seeded: usize,
    /// Whether the run ended on a cancellation request
    pub cancelled: bool,
}

/// One user session: pipeline components plus the canonical working set
#[derive(Debug)]
pub struct Session {
    orchestrator: SearchOrchestrator,
    enricher: FullTextEnricher,
    dispatcher: AnalysisDispatcher,
    query_gen: Option<Arc<dyn QueryGenCapability>>,
    store: Mutex<LifecycleStore>,
    busy: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl Session {
    /// Create a session over the given capabilities
    pub fn new(
        search: Arc<dyn SearchCapability>,
        full_text: Arc<dyn FullTextCapability>,
        analysis: Arc<dyn AnalysisCapability>,
    ) -> Self {
        Self {
            orchestrator: SearchOrchestrator::new(search),
            enricher: FullTextEnricher::new(full_text),
            dispatcher: AnalysisDispatcher::new(analysis),
            query_gen: None,
            store: Mutex::new(LifecycleStore::new()),
            busy: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Attach a query generation capability
    pub fn with_query_gen(mut self, query_gen: Arc<dyn QueryGenCapability>) -> Self {
        self.query_gen = Some(query_gen);
        self
    }

    /// Override the enrichment concurrency bound
    pub fn with_enrichment_concurrency(mut self, concurrency: usize) -> Self {
        self.enricher = self.enricher.with_concurrency(concurrency);
        self
    }

    /// Override the orchestrator's per-batch retry policy
    pub fn with_search_retry_config(mut self, retry: crate::utils::RetryConfig) -> Self {
        self.orchestrator = self.orchestrator.with_retry_config(retry);
        self
    }

    /// Whether a pipeline run is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation of the in-flight run.
    ///
    /// The run keeps whatever batches were already aggregated.
    pub fn cancel(&self) {
        self.lock_cancel().cancel();
    }

    /// Run the full pipeline: orchestrate, enrich, seed the store.
    ///
    /// Rejects concurrent runs with [`SearchError::Busy`]. On failure the
    /// store is left untouched and the partial aggregation is dropped.
    pub async fn run_search(&self, request: SearchRequest) -> Result<SearchSummary, SearchError> {
        request.validate()?;

        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(SearchError::Busy);
        }

        let token = CancellationToken::new();
        *self.lock_cancel() = token.clone();

        let result = self.run_pipeline(&request, &token).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_pipeline(
        &self,
        request: &SearchRequest,
        token: &CancellationToken,
    ) -> Result<SearchSummary, SearchError> {
        let articles = self.orchestrator.execute(request, token).await?;
        let fetched = articles.len();

        let articles = self
            .enricher
            .enrich(articles, request.fetch_full_text, token)
            .await;

        let seeded = self.lock_store().seed(articles);

        Ok(SearchSummary {
            fetched,
            seeded,
            cancelled: token.is_cancelled(),
        })
    }

    /// Generate a search query from a free-text research idea
    pub async fn generate_query(&self, idea: &str) -> Result<String, CapabilityError> {
        if idea.trim().is_empty() {
            return Err(CapabilityError::Rejected(
                ValidationError::EmptyIdea.to_string(),
            ));
        }
        let Some(query_gen) = &self.query_gen else {
            return Err(CapabilityError::Unavailable(
                "query generation capability not configured".to_string(),
            ));
        };
        query_gen.generate(idea).await
    }

    /// Export the current selection
    pub fn export_selection(&self, config: &ExportConfig) -> Result<ExportArtifact, ValidationError> {
        let selected = self.lock_store().selected_articles();
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        export(&selected, config)
    }

    /// Submit the current selection for synthesis
    pub async fn analyze_selection(&self) -> Result<String, AnalysisError> {
        let selected = self.lock_store().selected_articles();
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        self.dispatcher.analyze(&selected).await
    }

    // ========== STORE OPERATIONS ==========

    /// Snapshot of the active partition
    pub fn active_articles(&self) -> Vec<Article> {
        self.lock_store().active().to_vec()
    }

    /// Snapshot of the trash
    pub fn trashed_articles(&self) -> Vec<Article> {
        self.lock_store().trashed().to_vec()
    }

    /// Currently selected pmids
    pub fn selection_ids(&self) -> Vec<String> {
        self.lock_store().selection().iter().cloned().collect()
    }

    /// Toggle selection for a pmid; returns whether it is selected afterwards
    pub fn toggle_select(&self, pmid: &str) -> bool {
        self.lock_store().toggle_select(pmid)
    }

    /// Select every active record
    pub fn select_all(&self) {
        self.lock_store().select_all();
    }

    /// Clear the selection
    pub fn clear_selection(&self) {
        self.lock_store().clear_selection();
    }

    /// Move the given pmids to the trash
    pub fn move_to_trash(&self, pmids: &[String]) -> Result<usize, ValidationError> {
        self.lock_store().move_to_trash(pmids)
    }

    /// Move the current selection to the trash
    pub fn trash_selection(&self) -> Result<usize, ValidationError> {
        let mut store = self.lock_store();
        let selected: Vec<String> = store.selection().iter().cloned().collect();
        store.move_to_trash(&selected)
    }

    /// Restore the given pmids from the trash
    pub fn restore(&self, pmids: &[String]) -> usize {
        self.lock_store().restore(pmids)
    }

    /// Permanently delete the given pmids from the trash
    pub fn permanently_delete(&self, pmids: &[String]) -> usize {
        self.lock_store().permanently_delete(pmids)
    }

    /// Permanently delete everything in the trash.
    ///
    /// Explicitly passes the full trashed id set; the store never infers
    /// "empty the trash" from an empty argument.
    pub fn empty_trash(&self) -> usize {
        let mut store = self.lock_store();
        let all = store.trashed_ids();
        store.permanently_delete(&all)
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, LifecycleStore> {
        self.store.lock().expect("store lock poisoned")
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().expect("cancel lock poisoned")
    }
}
