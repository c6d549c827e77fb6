use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::batching::BatchWindow;
use crate::record::SearchableRecord;
use crate::search::{prepare_meta_data, Page, RecordPredicate};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Failed to decode row {id}: {reason}")]
    Decode { id: i64, reason: String },
    #[error("Invalid column name '{0}'")]
    InvalidColumn(String),
    #[error("No SQL connection string configured")]
    MissingUrl,
}

/// Which records a bulk operation walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordView {
    /// Records without a soft-delete marker
    Active,
    /// Soft-deleted records only
    OnlyDeleted,
}

impl RecordView {
    #[must_use]
    pub fn includes(&self, record: &SearchableRecord) -> bool {
        match self {
            Self::Active => !record.is_deleted(),
            Self::OnlyDeleted => record.is_deleted(),
        }
    }
}

/// Ordered list of `column = value` constraints, AND-ed together.
///
/// A `null` value matches records where the column is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause(Vec<(String, Value)>);

impl WhereClause {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((column.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn matches(&self, record: &SearchableRecord) -> bool {
        self.0.iter().all(|(column, expected)| match record.column(column) {
            Some(actual) => actual == *expected,
            None => expected.is_null(),
        })
    }
}

/// The relational store records are synced from and searches resolve against.
///
/// Pages are always ordered by ascending id so offset windows stay stable
/// while the store is written to.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Count records in `view` matching `filter`.
    async fn count(&self, view: RecordView, filter: &WhereClause) -> Result<u64, StorageError>;

    /// Fetch up to `window.take` records from offset `window.skip`, by ascending id.
    async fn fetch_page(
        &self,
        view: RecordView,
        filter: &WhereClause,
        window: BatchWindow,
    ) -> Result<Vec<SearchableRecord>, StorageError>;

    /// Records matching a routed predicate, in the predicate's order.
    async fn select(
        &self,
        predicate: &RecordPredicate,
        skip: u64,
        take: u64,
    ) -> Result<Vec<SearchableRecord>, StorageError>;

    /// Total records matching a routed predicate.
    async fn count_matching(&self, predicate: &RecordPredicate) -> Result<u64, StorageError>;

    /// One page of a routed search. `page` is 1-based; 0 is treated as 1.
    async fn paginate(
        &self,
        predicate: &RecordPredicate,
        page: u64,
        per_page: u64,
    ) -> Result<Page<SearchableRecord>, StorageError> {
        let page = page.max(1);
        let total = self.count_matching(predicate).await?;
        let items = if per_page == 0 {
            Vec::new()
        } else {
            self.select(predicate, (page - 1).saturating_mul(per_page), per_page).await?
        };
        Ok(Page {
            items,
            meta: prepare_meta_data(total, page, per_page),
        })
    }
}
