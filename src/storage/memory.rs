use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::{RecordSource, RecordView, StorageError, WhereClause};
use crate::batching::BatchWindow;
use crate::record::SearchableRecord;
use crate::search::RecordPredicate;

/// Record source backed by an ordered map, for tests and demos.
pub struct InMemoryRecordSource {
    records: RwLock<BTreeMap<i64, SearchableRecord>>,
    fetches: AtomicUsize,
    /// Page fetches numbered at or above this fail (usize::MAX = never)
    fail_from: AtomicUsize,
}

impl InMemoryRecordSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            fetches: AtomicUsize::new(0),
            fail_from: AtomicUsize::new(usize::MAX),
        }
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: SearchableRecord) {
        self.records.write().insert(record.id, record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = SearchableRecord>) {
        let mut map = self.records.write();
        for record in records {
            map.insert(record.id, record);
        }
    }

    /// Set the soft-delete marker. Returns `false` if no such record.
    pub fn soft_delete(&self, id: i64, deleted_at: i64) -> bool {
        match self.records.write().get_mut(&id) {
            Some(record) => {
                record.deleted_at = Some(deleted_at);
                true
            }
            None => false,
        }
    }

    /// Hard delete
    pub fn remove(&self, id: i64) -> Option<SearchableRecord> {
        self.records.write().remove(&id)
    }

    /// Get current record count (all views)
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Page fetches served so far
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Fail every page fetch from the `n`th (0-based) onwards.
    pub fn fail_fetches_from(&self, n: usize) {
        self.fail_from.store(n, Ordering::SeqCst);
    }
}

impl Default for InMemoryRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn count(&self, view: RecordView, filter: &WhereClause) -> Result<u64, StorageError> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|r| view.includes(r) && filter.matches(r))
            .count() as u64)
    }

    async fn fetch_page(
        &self,
        view: RecordView,
        filter: &WhereClause,
        window: BatchWindow,
    ) -> Result<Vec<SearchableRecord>, StorageError> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_from.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected failure on fetch {call}")));
        }

        // BTreeMap iterates in ascending id order
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|r| view.includes(r) && filter.matches(r))
            .skip(usize::try_from(window.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(window.take).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn select(
        &self,
        predicate: &RecordPredicate,
        skip: u64,
        take: u64,
    ) -> Result<Vec<SearchableRecord>, StorageError> {
        let matched = predicate.apply(self.records.read().values());
        Ok(matched
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(take).unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_matching(&self, predicate: &RecordPredicate) -> Result<u64, StorageError> {
        let records = self.records.read();
        Ok(records.values().filter(|r| predicate.matches(r)).count() as u64)
    }
}
