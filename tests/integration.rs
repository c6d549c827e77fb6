//! Integration tests for index-sync.
//!
//! Every test runs against the in-memory index and either the in-memory
//! record source or a throwaway SQLite file, so nothing external is needed.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: schema, bulk sync, routing, pagination
//! - `failure_*` - Failure scenarios: index outages, degraded routing

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::{json, Value};

use index_sync::client::{InMemoryIndex, Method};
use index_sync::schema::{FieldDescriptor, SchemaDefinition};
use index_sync::search::{FixedProvider, RouteOutcome, SearchFilters, SortRequest};
use index_sync::storage::{InMemoryRecordSource, SqlRecordSource, WhereClause};
use index_sync::sync::{CollectionDescriptor, DomainError, SearchDomains, SyncError};
use index_sync::{EmptyBatchPolicy, IndexSyncConfig, RecordSource, SearchableRecord};

// =============================================================================
// Helpers
// =============================================================================

fn temp_db_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("index_sync_it_{}_{}.db", name, std::process::id()))
}

/// Clean up SQLite database and its WAL files
fn cleanup_db(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(format!("{}-wal", path.display()));
    let _ = std::fs::remove_file(format!("{}-shm", path.display()));
}

async fn sqlite_source(path: &PathBuf) -> Arc<SqlRecordSource> {
    cleanup_db(path);
    let config = IndexSyncConfig {
        sql_url: Some(format!("sqlite://{}?mode=rwc", path.display())),
        ..IndexSyncConfig::default()
    };
    Arc::new(SqlRecordSource::from_config(&config).await.expect("sqlite source"))
}

fn trail(id: i64) -> SearchableRecord {
    SearchableRecord::new(id, "en", format!("Trail {id}"))
        .with_created_at(1_000 + id)
        .with_field("category", json!(if id % 2 == 0 { "hiking" } else { "cycling" }))
}

fn config() -> IndexSyncConfig {
    IndexSyncConfig::default().with_schema(
        "trails",
        SchemaDefinition::with_fields(vec![
            FieldDescriptor::new("title", "text_edge_ngram"),
            FieldDescriptor::new("category", "string"),
        ]),
    )
}

fn trails_descriptor(source: Arc<dyn RecordSource>) -> CollectionDescriptor {
    CollectionDescriptor::new("trails", source)
        .search_fields(["title"])
        .filter_keys(["category"])
}

fn update_bodies(index: &InMemoryIndex) -> Vec<Value> {
    index
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::Post && r.path.starts_with("/trails/update"))
        .filter_map(|r| r.body)
        .collect()
}

// =============================================================================
// Happy Path Tests
// =============================================================================

#[tokio::test]
async fn happy_full_flow_against_sqlite() {
    let path = temp_db_path("full_flow");
    let source = sqlite_source(&path).await;
    let records: Vec<_> = (1..=250).map(trail).collect();
    source.upsert_many(&records).await.unwrap();

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    domains.register("trails", trails_descriptor(source.clone())).unwrap();

    domains.migrate_schema("trails").await.unwrap();
    assert_eq!(index.field_types("trails"), vec!["text_edge_ngram".to_string()]);
    assert_eq!(index.fields("trails"), vec!["title".to_string(), "category".to_string()]);

    let report = domains.sync("trails").await.unwrap();
    assert_eq!(report.pushed.batches, 3);
    assert_eq!(report.pushed.pushed, 250);
    assert_eq!(report.deleted.pushed, 0);

    // Exactly 250 distinct ids across the three pushes
    let bodies = update_bodies(&index);
    assert_eq!(bodies.len(), 3);
    let mut seen = HashSet::new();
    for body in &bodies {
        for doc in body.as_array().unwrap() {
            assert!(seen.insert(doc["id"].as_i64().unwrap()));
        }
    }
    assert_eq!(seen.len(), 250);
    assert_eq!(index.document("trails", 2), Some(json!({"id": 2, "language": "en", "title": "Trail 2", "category": "hiking"})));

    cleanup_db(&path);
}

#[tokio::test]
async fn happy_soft_deleted_records_leave_the_index() {
    let path = temp_db_path("soft_delete");
    let source = sqlite_source(&path).await;
    source.upsert_many(&(1..=5).map(trail).collect::<Vec<_>>()).await.unwrap();

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    domains.register("trails", trails_descriptor(source.clone())).unwrap();
    domains.sync("trails").await.unwrap();

    assert!(source.soft_delete(3, 9_999).await.unwrap());
    let report = domains.sync("trails").await.unwrap();

    assert_eq!(report.pushed.pushed, 4);
    assert_eq!(report.deleted.pushed, 1);
    assert_eq!(update_bodies(&index).last(), Some(&json!({"delete": [3]})));
    assert_eq!(index.document_ids("trails"), vec![1, 2, 4, 5]);

    cleanup_db(&path);
}

#[tokio::test]
async fn happy_filtered_sync_uses_the_same_filter_for_count_and_pages() {
    let path = temp_db_path("filtered");
    let source = sqlite_source(&path).await;
    source.upsert_many(&(1..=10).map(trail).collect::<Vec<_>>()).await.unwrap();

    let index = Arc::new(InMemoryIndex::new());
    let config = IndexSyncConfig { batch_size: 2, ..config() };
    let domains = SearchDomains::new(index.clone(), config);
    let engine = domains.register("trails", trails_descriptor(source.clone())).unwrap();

    let report = engine
        .full_sync(&WhereClause::new().eq("category", "hiking"))
        .await
        .unwrap();

    // 5 hiking records in pages of 2: [0,2) [2,4) [4,6)
    assert_eq!(report.batches, 3);
    assert_eq!(report.skipped_empty, 0);
    assert_eq!(index.document_ids("trails"), vec![2, 4, 6, 8, 10]);

    cleanup_db(&path);
}

#[tokio::test]
async fn happy_route_and_paginate_in_rank_order() {
    let path = temp_db_path("rank_order");
    let source = sqlite_source(&path).await;
    source.upsert_many(&(1..=6).map(trail).collect::<Vec<_>>()).await.unwrap();

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    let engine = domains.register("trails", trails_descriptor(source.clone())).unwrap();
    index.set_ranking("trails", vec![5, 2, 9, 3]);

    let router = domains
        .router("trails", Arc::new(FixedProvider::new(index.clone())))
        .unwrap();
    let request = engine.route_request("en").keyword("trail");
    let page = engine.search(&router, &request, 1, 10).await.unwrap();

    // 9 is ranked but not stored
    assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 2, 3]);
    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.last_page, 1);

    let requests = index.requests();
    let select = &requests[0];
    assert_eq!(select.path, "/trails/select");
    assert_eq!(select.param("q"), Some("title:\"trail\"^20 "));
    assert_eq!(select.param("rows"), Some("2000"));
    assert_eq!(select.param("defType"), Some("edismax"));

    cleanup_db(&path);
}

#[tokio::test]
async fn happy_created_sort_overrides_rank() {
    let path = temp_db_path("created_sort");
    let source = sqlite_source(&path).await;
    source.upsert_many(&(1..=6).map(trail).collect::<Vec<_>>()).await.unwrap();

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    let engine = domains.register("trails", trails_descriptor(source.clone())).unwrap();
    index.set_ranking("trails", vec![4, 1, 6]);

    let router = engine.router(Arc::new(FixedProvider::new(index.clone())));
    let ascending = engine
        .route_request("en")
        .keyword("trail")
        .sort(SortRequest::parse(Some("created_data_asc")));
    let descending = ascending.clone().sort(SortRequest::parse(Some("created_data_desc")));

    let asc = engine.search(&router, &ascending, 1, 10).await.unwrap();
    let desc = engine.search(&router, &descending, 1, 10).await.unwrap();

    assert_eq!(asc.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 4, 6]);
    assert_eq!(desc.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![6, 4, 1]);

    cleanup_db(&path);
}

#[tokio::test]
async fn happy_filters_without_keyword_still_query_the_index() {
    let source = Arc::new(InMemoryRecordSource::new());
    source.extend((1..=4).map(trail));

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    let engine = domains.register("trails", trails_descriptor(source)).unwrap();
    index.set_ranking("trails", vec![2, 4]);

    let router = engine.router(Arc::new(FixedProvider::new(index.clone())));
    let request = engine
        .route_request("en")
        .filters(SearchFilters::new().with("category", "hiking").with("unknown", "x"));
    let decision = router.route_with_outcome(&request).await;

    assert_eq!(decision.outcome, RouteOutcome::Indexed { ids: 2 });
    assert_eq!(decision.predicate.id_in, Some(vec![2, 4]));
    assert_eq!(index.requests()[0].param("q"), Some("category:hiking"));
}

#[tokio::test]
async fn happy_short_keyword_stays_relational() {
    let source = Arc::new(InMemoryRecordSource::new());
    source.extend([
        SearchableRecord::new(1, "en", "Alps"),
        SearchableRecord::new(2, "en", "Andes"),
        SearchableRecord::new(3, "en", "Rockies"),
        SearchableRecord::new(4, "de", "Alpen"),
    ]);

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    let engine = domains.register("trails", trails_descriptor(source)).unwrap();

    let router = engine.router(Arc::new(FixedProvider::new(index.clone())));
    let request = engine.route_request("en").keyword("a");
    let page = engine.search(&router, &request, 1, 10).await.unwrap();

    assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(index.request_count(), 0);
}

#[tokio::test]
async fn happy_config_from_json_drives_the_engine() {
    let raw = r#"{
        "batch_size": 2,
        "empty_batch_policy": "push",
        "headers": {"X-Tenant": "alpine"}
    }"#;
    let config = IndexSyncConfig::from_json(raw).unwrap();
    assert_eq!(config.empty_batch_policy, EmptyBatchPolicy::Push);
    assert_eq!(config.search_rows, 2000);

    let source = Arc::new(InMemoryRecordSource::new());
    source.extend((1..=4).map(trail));
    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config);
    let engine = domains.register("trails", trails_descriptor(source)).unwrap();

    let report = engine.full_sync(&WhereClause::new()).await.unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(update_bodies(&index).last(), Some(&json!([])));
    assert!(index
        .requests()
        .iter()
        .all(|r| r.headers.get("X-Tenant").map(String::as_str) == Some("alpine")));
}

// =============================================================================
// Failure Scenario Tests
// =============================================================================

#[tokio::test]
async fn failure_index_outage_aborts_bulk_sync() {
    let source = Arc::new(InMemoryRecordSource::new());
    source.extend((1..=250).map(trail));

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    domains.register("trails", trails_descriptor(source)).unwrap();

    index.fail_from_call(2);
    let err = domains.sync("trails").await.unwrap_err();
    assert!(matches!(err, DomainError::Sync(SyncError::Push { .. })));
    assert_eq!(index.document_ids("trails").len(), 200);

    // A later run covers everything again
    index.heal();
    let report = domains.sync("trails").await.unwrap();
    assert_eq!(report.pushed.pushed, 250);
    assert_eq!(index.document_ids("trails").len(), 250);
}

#[tokio::test]
async fn failure_search_error_narrows_to_nothing() {
    let source = Arc::new(InMemoryRecordSource::new());
    source.extend((1..=3).map(trail));

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config());
    let engine = domains.register("trails", trails_descriptor(source)).unwrap();
    index.fail_from_call(0);

    let router = engine.router(Arc::new(FixedProvider::new(index.clone())));
    let page = engine
        .search(&router, &engine.route_request("en").keyword("trail"), 1, 10)
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.meta.total, 0);
}

#[tokio::test]
async fn failure_missing_accessor_degrades_to_relational() {
    let source = Arc::new(InMemoryRecordSource::new());
    source.extend((1..=3).map(trail));

    let domains = SearchDomains::new(Arc::new(InMemoryIndex::new()), config());
    let engine = domains.register("trails", trails_descriptor(source)).unwrap();

    let router = engine.router(Arc::new(FixedProvider::unavailable()));
    let request = engine.route_request("en").keyword("trail");
    let decision = router.route_with_outcome(&request).await;
    assert_eq!(decision.outcome, RouteOutcome::Degraded);

    let page = engine.search(&router, &request, 1, 10).await.unwrap();
    assert_eq!(page.meta.total, 3);
}

#[tokio::test]
async fn failure_unknown_schema_makes_no_call() {
    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), IndexSyncConfig::default());
    domains
        .register("trails", trails_descriptor(Arc::new(InMemoryRecordSource::new())))
        .unwrap();

    let err = domains.migrate_schema("trails").await.unwrap_err();
    assert!(matches!(err, DomainError::Schema(_)));
    assert_eq!(index.request_count(), 0);
}

// =============================================================================
// Metrics
// =============================================================================

#[test]
fn happy_bulk_sync_emits_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let source = Arc::new(InMemoryRecordSource::new());
            source.extend((1..=250).map(trail));
            let domains = SearchDomains::new(Arc::new(InMemoryIndex::new()), config());
            domains.register("trails", trails_descriptor(source)).unwrap();
            domains.sync("trails").await.unwrap();
        });
    });

    let counter = |name: &str, kind: &str| -> u64 {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.key().name() == name
                    && key.key().labels().any(|l| l.key() == "kind" && l.value() == kind)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => v,
                _ => 0,
            })
            .sum()
    };

    assert_eq!(counter("index_sync_batches_total", "push"), 3);
    assert_eq!(counter("index_sync_records_total", "push"), 250);
    assert_eq!(counter("index_sync_batches_skipped_total", "delete"), 1);
}
