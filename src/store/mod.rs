//! Article lifecycle store: active and trashed partitions plus a selection
//! overlay.
//!
//! Per-pmid state machine: `Active <-> Trashed -> Removed`. A record never
//! leaves the active set except through the trash, and deletion from the
//! trash is permanent. The selection is an ephemeral overlay over the active
//! partition and is always a subset of it.
//!
//! The store itself is single-threaded; the owning session serializes access
//! behind one lock so mutations are atomic with respect to each other.

use std::collections::HashSet;

use crate::models::Article;
use crate::utils::ValidationError;

/// Canonical collection of records for one session
#[derive(Debug, Default)]
pub struct LifecycleStore {
    active: Vec<Article>,
    trashed: Vec<Article>,
    selection: HashSet<String>,
}

impl LifecycleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set with a fresh pipeline result.
    ///
    /// Clears the selection and leaves the trash untouched. Records whose
    /// pmid is already in the trash are dropped, and duplicate pmids within
    /// the input keep their first occurrence, so pmids stay unique across
    /// both partitions. Returns the number of records seeded.
    pub fn seed(&mut self, records: Vec<Article>) -> usize {
        self.selection.clear();

        let trashed_ids: HashSet<&str> = self.trashed.iter().map(|a| a.pmid.as_str()).collect();
        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());

        self.active = records
            .into_iter()
            .filter(|article| {
                !trashed_ids.contains(article.pmid.as_str()) && seen.insert(article.pmid.clone())
            })
            .collect();

        self.active.len()
    }

    /// Records in the active partition, in pipeline order
    pub fn active(&self) -> &[Article] {
        &self.active
    }

    /// Records in the trash, in the order they were trashed
    pub fn trashed(&self) -> &[Article] {
        &self.trashed
    }

    /// Pmids of the active partition
    pub fn active_ids(&self) -> Vec<String> {
        self.active.iter().map(|a| a.pmid.clone()).collect()
    }

    /// Pmids of the trash. Pass this to [`Self::permanently_delete`] to empty
    /// the trash.
    pub fn trashed_ids(&self) -> Vec<String> {
        self.trashed.iter().map(|a| a.pmid.clone()).collect()
    }

    /// Currently selected pmids (unordered)
    pub fn selection(&self) -> &HashSet<String> {
        &self.selection
    }

    /// Selected records in active-partition order
    pub fn selected_articles(&self) -> Vec<Article> {
        self.active
            .iter()
            .filter(|a| self.selection.contains(&a.pmid))
            .cloned()
            .collect()
    }

    /// Whether a pmid is currently selected
    pub fn is_selected(&self, pmid: &str) -> bool {
        self.selection.contains(pmid)
    }

    /// Toggle selection for an active pmid. Unknown pmids are a silent no-op.
    /// Returns whether the pmid is selected afterwards.
    pub fn toggle_select(&mut self, pmid: &str) -> bool {
        if !self.active.iter().any(|a| a.pmid == pmid) {
            return false;
        }
        if self.selection.remove(pmid) {
            false
        } else {
            self.selection.insert(pmid.to_string());
            true
        }
    }

    /// Select every active record
    pub fn select_all(&mut self) {
        self.selection = self.active.iter().map(|a| a.pmid.clone()).collect();
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Move the given pmids from active to trashed.
    ///
    /// Errors on an empty id set. Ids not present in the active partition are
    /// silently skipped. Selection entries for moved records are pruned.
    /// Returns the number of records moved.
    pub fn move_to_trash(&mut self, pmids: &[String]) -> Result<usize, ValidationError> {
        if pmids.is_empty() {
            return Err(ValidationError::NothingToTrash);
        }

        let wanted: HashSet<&str> = pmids.iter().map(String::as_str).collect();
        let mut kept = Vec::with_capacity(self.active.len());
        let mut moved = 0usize;

        for article in self.active.drain(..) {
            if wanted.contains(article.pmid.as_str()) {
                self.selection.remove(&article.pmid);
                self.trashed.push(article);
                moved += 1;
            } else {
                kept.push(article);
            }
        }
        self.active = kept;

        tracing::debug!(moved, trashed = self.trashed.len(), "records moved to trash");
        Ok(moved)
    }

    /// Move the given pmids from trashed back to active.
    ///
    /// Ids not present in the trash are silently skipped. Restored records
    /// are appended to the active partition in their trash order. Returns the
    /// number of records restored.
    pub fn restore(&mut self, pmids: &[String]) -> usize {
        let wanted: HashSet<&str> = pmids.iter().map(String::as_str).collect();
        let mut kept = Vec::with_capacity(self.trashed.len());
        let mut restored = 0usize;

        for article in self.trashed.drain(..) {
            if wanted.contains(article.pmid.as_str()) {
                self.active.push(article);
                restored += 1;
            } else {
                kept.push(article);
            }
        }
        self.trashed = kept;

        restored
    }

    /// Permanently remove the given pmids from the trash.
    ///
    /// Irreversible. An empty id set is a no-op: emptying the whole trash
    /// requires explicitly passing [`Self::trashed_ids`]. Returns the number
    /// of records removed.
    pub fn permanently_delete(&mut self, pmids: &[String]) -> usize {
        if pmids.is_empty() {
            return 0;
        }

        let wanted: HashSet<&str> = pmids.iter().map(String::as_str).collect();
        let before = self.trashed.len();
        self.trashed.retain(|a| !wanted.contains(a.pmid.as_str()));
        let removed = before - self.trashed.len();

        if removed > 0 {
            tracing::debug!(removed, "records permanently deleted");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::mock::make_article;

    fn seeded(pmids: &[&str]) -> LifecycleStore {
        let mut store = LifecycleStore::new();
        store.seed(
            pmids
                .iter()
                .map(|p| make_article(p, &format!("Title {}", p)))
                .collect(),
        );
        store
    }

    fn ids(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.pmid.as_str()).collect()
    }

    #[test]
    fn test_seed_replaces_active_and_clears_selection() {
        let mut store = seeded(&["1", "2"]);
        store.toggle_select("1");

        store.seed(vec![make_article("3", "Third")]);

        assert_eq!(ids(store.active()), vec!["3"]);
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_seed_dedups_and_skips_trashed() {
        let mut store = seeded(&["1", "2"]);
        store.move_to_trash(&["2".to_string()]).unwrap();

        let seeded_count = store.seed(vec![
            make_article("1", "again"),
            make_article("1", "duplicate"),
            make_article("2", "still trashed"),
            make_article("4", "new"),
        ]);

        assert_eq!(seeded_count, 2);
        assert_eq!(ids(store.active()), vec!["1", "4"]);
        assert_eq!(ids(store.trashed()), vec!["2"]);
    }

    #[test]
    fn test_toggle_select_respects_active_partition() {
        let mut store = seeded(&["1", "2"]);

        assert!(store.toggle_select("1"));
        assert!(store.is_selected("1"));
        assert!(!store.toggle_select("1"));
        assert!(!store.is_selected("1"));

        // unknown pmid is a silent no-op
        assert!(!store.toggle_select("99"));
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_move_to_trash_requires_ids() {
        let mut store = seeded(&["1"]);
        assert_eq!(
            store.move_to_trash(&[]),
            Err(ValidationError::NothingToTrash)
        );
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn test_move_to_trash_prunes_selection() {
        let mut store = seeded(&["1", "2", "3"]);
        store.select_all();

        let moved = store
            .move_to_trash(&["1".to_string(), "3".to_string(), "99".to_string()])
            .unwrap();

        assert_eq!(moved, 2);
        assert_eq!(ids(store.active()), vec!["2"]);
        assert_eq!(ids(store.trashed()), vec!["1", "3"]);
        // selection ∩ active stays consistent
        assert!(store.is_selected("2"));
        assert!(!store.is_selected("1"));
        assert!(!store.is_selected("3"));
    }

    #[test]
    fn test_trash_restore_round_trip() {
        let mut store = seeded(&["1", "2", "3"]);

        store
            .move_to_trash(&["1".to_string(), "2".to_string()])
            .unwrap();
        let restored = store.restore(&["1".to_string(), "2".to_string(), "99".to_string()]);

        assert_eq!(restored, 2);
        let mut active: Vec<&str> = ids(store.active());
        active.sort_unstable();
        assert_eq!(active, vec!["1", "2", "3"]);
        assert!(store.trashed().is_empty());
    }

    #[test]
    fn test_permanently_delete_is_irreversible() {
        let mut store = seeded(&["1", "2"]);
        store
            .move_to_trash(&["1".to_string(), "2".to_string()])
            .unwrap();

        assert_eq!(store.permanently_delete(&["1".to_string()]), 1);
        assert_eq!(ids(store.trashed()), vec!["2"]);

        // the deleted record is gone from both partitions
        assert_eq!(store.restore(&["1".to_string()]), 0);
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_permanently_delete_empty_set_is_noop() {
        let mut store = seeded(&["1"]);
        store.move_to_trash(&["1".to_string()]).unwrap();

        assert_eq!(store.permanently_delete(&[]), 0);
        assert_eq!(store.trashed().len(), 1);
    }

    #[test]
    fn test_empty_trash_via_trashed_ids() {
        let mut store = seeded(&["1", "2"]);
        store
            .move_to_trash(&["1".to_string(), "2".to_string()])
            .unwrap();

        let all = store.trashed_ids();
        assert_eq!(store.permanently_delete(&all), 2);
        assert!(store.trashed().is_empty());
    }

    #[test]
    fn test_selected_articles_follow_active_order() {
        let mut store = seeded(&["1", "2", "3"]);
        store.toggle_select("3");
        store.toggle_select("1");

        assert_eq!(ids(&store.selected_articles()), vec!["1", "3"]);
    }
}
