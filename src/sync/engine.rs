// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk and single-record synchronization for one collection.
//!
//! # Failure Policy
//!
//! ```text
//! full_sync / delete_sync   any failure → error! + Err(SyncError)
//!                           batches already pushed stay committed
//! sync_one / delete_one     any failure → error!, swallowed
//! ```
//!
//! Bulk batches run strictly in increasing `skip` order, one request in
//! flight at a time. Every page is fetched by ascending id, so a record
//! whose natural order changes mid-sync is neither skipped nor visited twice.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::descriptor::CollectionDescriptor;
use super::formatter::{format_checked, FormatError};
use crate::batching::{BatchPlanner, BatchWindow, PlanError};
use crate::client::{Headers, IndexClient, IndexCollection, IndexError, UpdateCommand};
use crate::config::{EmptyBatchPolicy, IndexSyncConfig};
use crate::metrics;
use crate::record::SearchableRecord;
use crate::schema::{SchemaMigrator, SchemaRegistry};
use crate::search::{IndexProvider, Page, QueryTranslator, ResultRouter, RouteRequest};
use crate::storage::{RecordView, StorageError, WhereClause};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("invalid batch size: {0}")]
    Plan(#[from] PlanError),

    #[error("counting records for '{collection}' failed: {source}")]
    Count { collection: String, source: StorageError },

    #[error("fetching {window} for '{collection}' failed: {source}")]
    Fetch { collection: String, window: BatchWindow, source: StorageError },

    #[error("formatting {window} for '{collection}' failed: {source}")]
    Format { collection: String, window: BatchWindow, source: FormatError },

    #[error("pushing {window} to '{collection}' failed: {source}")]
    Push { collection: String, window: BatchWindow, source: IndexError },
}

/// Direction of a bulk sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Push active records as documents
    Push,
    /// Delete soft-deleted records by id
    Delete,
}

impl SyncKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Delete => "delete",
        }
    }

    fn view(&self) -> RecordView {
        match self {
            Self::Push => RecordView::Active,
            Self::Delete => RecordView::OnlyDeleted,
        }
    }
}

/// What a bulk sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Update calls sent
    pub batches: usize,
    /// Documents or ids carried by those calls
    pub pushed: usize,
    /// Records fetched from the source
    pub records: usize,
    /// Empty pages not pushed under [`EmptyBatchPolicy::Skip`]
    pub skipped_empty: usize,
}

/// Sync engine for one collection.
pub struct IndexSyncEngine {
    descriptor: CollectionDescriptor,
    collection: IndexCollection,
    planner: BatchPlanner,
    empty_batch_policy: EmptyBatchPolicy,
    search_rows: u32,
    keyword_boost: u32,
    headers: Headers,
    migrator: SchemaMigrator,
}

impl IndexSyncEngine {
    pub fn new(
        descriptor: CollectionDescriptor,
        client: Arc<dyn IndexClient>,
        config: &IndexSyncConfig,
        schemas: Arc<SchemaRegistry>,
    ) -> Result<Self, SyncError> {
        let planner = BatchPlanner::new(config.batch_size)?;
        let collection = IndexCollection::new(client, descriptor.collection.clone()).with_headers(&config.headers);
        let migrator = SchemaMigrator::new(collection.clone(), schemas, config.field_types.clone());

        Ok(Self {
            descriptor,
            collection,
            planner,
            empty_batch_policy: config.empty_batch_policy,
            search_rows: config.search_rows,
            keyword_boost: config.keyword_boost,
            headers: config.headers.clone(),
            migrator,
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.descriptor.collection
    }

    #[must_use]
    pub fn migrator(&self) -> &SchemaMigrator {
        &self.migrator
    }

    /// A router for this collection's search fields and filter keys.
    pub fn router(&self, provider: Arc<dyn IndexProvider>) -> ResultRouter {
        let translator = QueryTranslator::new(self.descriptor.search_fields.clone()).with_boost(self.keyword_boost);
        ResultRouter::new(
            self.descriptor.collection.clone(),
            translator,
            self.descriptor.filter_keys.clone(),
            provider,
        )
        .with_headers(self.headers.clone())
    }

    /// A request carrying the configured row cap.
    pub fn route_request(&self, locale: impl Into<String>) -> RouteRequest {
        RouteRequest::new(locale).rows(self.search_rows)
    }

    /// Route a request, then fetch one page of matching records.
    pub async fn search(
        &self,
        router: &ResultRouter,
        request: &RouteRequest,
        page: u64,
        per_page: u64,
    ) -> Result<Page<SearchableRecord>, StorageError> {
        let predicate = router.route(request).await;
        self.descriptor.record_source.paginate(&predicate, page, per_page).await
    }

    /// Push every active record matching `filter`, one page per update call.
    pub async fn full_sync(&self, filter: &WhereClause) -> Result<SyncReport, SyncError> {
        self.run_bulk(SyncKind::Push, filter).await
    }

    /// Delete every soft-deleted record matching `filter` from the index.
    pub async fn delete_sync(&self, filter: &WhereClause) -> Result<SyncReport, SyncError> {
        self.run_bulk(SyncKind::Delete, filter).await
    }

    async fn run_bulk(&self, kind: SyncKind, filter: &WhereClause) -> Result<SyncReport, SyncError> {
        let name = self.collection_name();
        let source = &self.descriptor.record_source;

        let count = source
            .count(kind.view(), filter)
            .await
            .map_err(|source| self.abort(kind, SyncError::Count { collection: name.to_string(), source }))?;

        let windows = self.planner.plan(count);
        info!(collection = name, kind = kind.as_str(), count, batches = windows.len(), "Bulk sync started");

        let mut report = SyncReport::default();
        for window in windows {
            let records = source.fetch_page(kind.view(), filter, window).await.map_err(|source| {
                self.abort(kind, SyncError::Fetch { collection: name.to_string(), window, source })
            })?;
            report.records += records.len();

            if records.is_empty() && self.empty_batch_policy == EmptyBatchPolicy::Skip {
                debug!(collection = name, skip = window.skip, take = window.take, "Skipping empty page");
                metrics::record_batch_skipped(name, kind.as_str());
                report.skipped_empty += 1;
                continue;
            }

            let command = match kind {
                SyncKind::Push => {
                    let documents = records
                        .iter()
                        .map(|record| format_checked(self.descriptor.formatter.as_ref(), record))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|source| {
                            self.abort(kind, SyncError::Format { collection: name.to_string(), window, source })
                        })?;
                    UpdateCommand::Documents(documents)
                }
                SyncKind::Delete => UpdateCommand::Delete(records.iter().map(|r| r.id).collect()),
            };

            self.collection.update(&command).await.map_err(|source| {
                self.abort(kind, SyncError::Push { collection: name.to_string(), window, source })
            })?;

            debug!(collection = name, skip = window.skip, take = window.take, size = command.len(), "Batch pushed");
            metrics::record_batch_pushed(name, kind.as_str(), command.len());
            report.batches += 1;
            report.pushed += command.len();
        }

        info!(
            collection = name,
            kind = kind.as_str(),
            batches = report.batches,
            pushed = report.pushed,
            skipped_empty = report.skipped_empty,
            "Bulk sync completed"
        );
        Ok(report)
    }

    fn abort(&self, kind: SyncKind, err: SyncError) -> SyncError {
        error!(collection = self.collection_name(), kind = kind.as_str(), error = %err, "Bulk sync aborted");
        metrics::record_sync_failure(self.collection_name(), kind.as_str());
        err
    }

    /// Push one record. Failures are logged and swallowed.
    pub async fn sync_one(&self, record: &SearchableRecord) {
        let name = self.collection_name();

        let document = match format_checked(self.descriptor.formatter.as_ref(), record) {
            Ok(document) => document,
            Err(e) => {
                error!(collection = name, id = record.id, error = %e, "Single-record sync failed");
                metrics::record_singleton(name, SyncKind::Push.as_str(), false);
                return;
            }
        };

        if record.is_deleted() {
            warn!(collection = name, id = record.id, "Pushing a soft-deleted record");
        }

        match self.collection.update(&UpdateCommand::Documents(vec![document])).await {
            Ok(_) => metrics::record_singleton(name, SyncKind::Push.as_str(), true),
            Err(e) => {
                error!(collection = name, id = record.id, error = %e, "Single-record sync failed");
                metrics::record_singleton(name, SyncKind::Push.as_str(), false);
            }
        }
    }

    /// Delete one document by id. Failures are logged and swallowed.
    pub async fn delete_one(&self, id: i64) {
        let name = self.collection_name();

        match self.collection.update(&UpdateCommand::DeleteOne(id)).await {
            Ok(_) => metrics::record_singleton(name, SyncKind::Delete.as_str(), true),
            Err(e) => {
                error!(collection = name, id, error = %e, "Single-record delete failed");
                metrics::record_singleton(name, SyncKind::Delete.as_str(), false);
            }
        }
    }
}

impl std::fmt::Debug for IndexSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSyncEngine")
            .field("descriptor", &self.descriptor)
            .field("batch_size", &self.planner.size())
            .field("empty_batch_policy", &self.empty_batch_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{InMemoryIndex, Method};
    use crate::record::IndexDocument;
    use crate::search::FixedProvider;
    use crate::storage::InMemoryRecordSource;
    use crate::sync::formatter::RecordFormatter;
    use serde_json::{json, Value};

    fn seeded(n: i64) -> Arc<InMemoryRecordSource> {
        let source = Arc::new(InMemoryRecordSource::new());
        source.extend((1..=n).map(|id| SearchableRecord::new(id, "en", format!("record {id}"))));
        source
    }

    fn engine_with(
        source: Arc<InMemoryRecordSource>,
        index: Arc<InMemoryIndex>,
        config: IndexSyncConfig,
    ) -> IndexSyncEngine {
        let descriptor = CollectionDescriptor::new("example", source).search_fields(["title"]);
        IndexSyncEngine::new(descriptor, index, &config, Arc::new(SchemaRegistry::new())).unwrap()
    }

    fn update_bodies(index: &InMemoryIndex) -> Vec<Value> {
        index
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Post && r.path == "/example/update?commit=true")
            .filter_map(|r| r.body)
            .collect()
    }

    #[tokio::test]
    async fn test_full_sync_250_records() {
        let index = Arc::new(InMemoryIndex::new());
        let engine = engine_with(seeded(250), index.clone(), IndexSyncConfig::default());

        let report = engine.full_sync(&WhereClause::new()).await.unwrap();

        assert_eq!(report, SyncReport { batches: 3, pushed: 250, records: 250, skipped_empty: 0 });
        let bodies = update_bodies(&index);
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies.iter().map(|b| b.as_array().unwrap().len()).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert_eq!(index.document_ids("example").len(), 250);
    }

    #[tokio::test]
    async fn test_exact_multiple_skips_empty_trailing_page() {
        let index = Arc::new(InMemoryIndex::new());
        let engine = engine_with(seeded(200), index.clone(), IndexSyncConfig::default());

        let report = engine.full_sync(&WhereClause::new()).await.unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(index.request_count(), 2);
    }

    #[tokio::test]
    async fn test_push_policy_sends_empty_page() {
        let index = Arc::new(InMemoryIndex::new());
        let config = IndexSyncConfig { empty_batch_policy: EmptyBatchPolicy::Push, ..Default::default() };
        let engine = engine_with(seeded(200), index.clone(), config);

        let report = engine.full_sync(&WhereClause::new()).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(update_bodies(&index).last(), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_push_policy_surfaces_rejected_empty_page() {
        let index = Arc::new(InMemoryIndex::new());
        index.reject_empty_updates(true);
        let config = IndexSyncConfig { empty_batch_policy: EmptyBatchPolicy::Push, ..Default::default() };
        let engine = engine_with(seeded(100), index.clone(), config);

        let err = engine.full_sync(&WhereClause::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::Push { window: BatchWindow { skip: 100, take: 100 }, .. }));
        assert_eq!(index.document_ids("example").len(), 100);
    }

    #[tokio::test]
    async fn test_push_failure_aborts_and_keeps_committed_batches() {
        let index = Arc::new(InMemoryIndex::new());
        index.fail_from_call(1);
        let engine = engine_with(seeded(250), index.clone(), IndexSyncConfig::default());

        let err = engine.full_sync(&WhereClause::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::Push { window: BatchWindow { skip: 100, .. }, .. }));
        assert_eq!(index.request_count(), 2);
        assert_eq!(index.document_ids("example").len(), 100);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let index = Arc::new(InMemoryIndex::new());
        let source = seeded(250);
        source.fail_fetches_from(2);
        let engine = engine_with(source, index.clone(), IndexSyncConfig::default());

        let err = engine.full_sync(&WhereClause::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::Fetch { window: BatchWindow { skip: 200, .. }, .. }));
        assert_eq!(index.request_count(), 2);
    }

    #[tokio::test]
    async fn test_format_failure_aborts_before_push() {
        let index = Arc::new(InMemoryIndex::new());
        let formatter = |record: &SearchableRecord| -> Result<IndexDocument, FormatError> {
            if record.id == 150 {
                Err(FormatError::Invalid { id: record.id, reason: "bad".to_string() })
            } else {
                Ok(IndexDocument::new(record.id))
            }
        };
        let descriptor = CollectionDescriptor::new("example", seeded(250)).formatter(Arc::new(formatter));
        let engine = IndexSyncEngine::new(
            descriptor,
            index.clone(),
            &IndexSyncConfig::default(),
            Arc::new(SchemaRegistry::new()),
        )
        .unwrap();

        let err = engine.full_sync(&WhereClause::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::Format { window: BatchWindow { skip: 100, .. }, .. }));
        assert_eq!(index.request_count(), 1);
    }

    #[tokio::test]
    async fn test_where_clause_limits_count_and_pages() {
        let index = Arc::new(InMemoryIndex::new());
        let source = seeded(10);
        source.upsert(SearchableRecord::new(11, "de", "berg"));
        let engine = engine_with(source, index.clone(), IndexSyncConfig::default());

        let report = engine.full_sync(&WhereClause::new().eq("language", "de")).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(index.document_ids("example"), vec![11]);
    }

    #[tokio::test]
    async fn test_delete_sync_pushes_id_lists() {
        let index = Arc::new(InMemoryIndex::new());
        let source = seeded(5);
        let engine = engine_with(source.clone(), index.clone(), IndexSyncConfig::default());
        engine.full_sync(&WhereClause::new()).await.unwrap();

        source.soft_delete(2, 1_000);
        source.soft_delete(4, 1_000);
        let report = engine.delete_sync(&WhereClause::new()).await.unwrap();

        assert_eq!(report.pushed, 2);
        assert_eq!(update_bodies(&index).last(), Some(&json!({"delete": [2, 4]})));
        assert_eq!(index.document_ids("example"), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let config = IndexSyncConfig { batch_size: 0, ..Default::default() };
        let descriptor = CollectionDescriptor::new("example", seeded(1));
        let result = IndexSyncEngine::new(
            descriptor,
            Arc::new(InMemoryIndex::new()),
            &config,
            Arc::new(SchemaRegistry::new()),
        );
        assert!(matches!(result, Err(SyncError::Plan(PlanError::ZeroBatchSize))));
    }

    #[tokio::test]
    async fn test_sync_one_and_delete_one() {
        let index = Arc::new(InMemoryIndex::new());
        let engine = engine_with(seeded(0), index.clone(), IndexSyncConfig::default());

        engine.sync_one(&SearchableRecord::new(7, "en", "Alps")).await;
        assert_eq!(update_bodies(&index)[0], json!([{"id": 7, "language": "en", "title": "Alps"}]));

        engine.delete_one(7).await;
        assert_eq!(update_bodies(&index)[1], json!({"delete": {"id": 7}}));
        assert!(index.document_ids("example").is_empty());
    }

    #[tokio::test]
    async fn test_singleton_failures_are_swallowed() {
        let index = Arc::new(InMemoryIndex::new());
        index.fail_from_call(0);
        let engine = engine_with(seeded(0), index.clone(), IndexSyncConfig::default());

        engine.sync_one(&SearchableRecord::new(7, "en", "Alps")).await;
        engine.delete_one(7).await;

        assert_eq!(index.request_count(), 2);
    }

    #[tokio::test]
    async fn test_headers_reach_every_request() {
        let index = Arc::new(InMemoryIndex::new());
        let mut config = IndexSyncConfig::default();
        config.headers.insert("X-Source".to_string(), "sync".to_string());
        let engine = engine_with(seeded(1), index.clone(), config);

        engine.full_sync(&WhereClause::new()).await.unwrap();

        let requests = index.requests();
        let headers = &requests[0].headers;
        assert_eq!(headers.get("X-Source").map(String::as_str), Some("sync"));
        assert_eq!(headers.get("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn test_search_routes_then_paginates() {
        let index = Arc::new(InMemoryIndex::new());
        let source = seeded(5);
        let engine = engine_with(source, index.clone(), IndexSyncConfig::default());
        index.set_ranking("example", vec![4, 2]);

        let router = engine.router(Arc::new(FixedProvider::new(index.clone())));
        let request = engine.route_request("en").keyword("record");
        let page = engine.search(&router, &request, 1, 10).await.unwrap();

        assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 2]);
        assert_eq!(page.meta.total, 2);
    }

    #[test]
    fn test_pass_through_is_default_formatter() {
        let engine = engine_with(seeded(0), Arc::new(InMemoryIndex::new()), IndexSyncConfig::default());
        let document = engine.descriptor().formatter.format(&SearchableRecord::new(1, "en", "t")).unwrap();
        assert_eq!(document.id, 1);
    }
}
