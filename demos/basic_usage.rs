// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic index-sync usage example.
//!
//! Demonstrates:
//! 1. Registering a search domain over an in-memory record source
//! 2. Migrating the index schema (field types, then fields)
//! 3. Bulk sync of active records and removal of soft-deleted ones
//! 4. Routing keyword, short-keyword and filter searches
//! 5. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

use index_sync::client::InMemoryIndex;
use index_sync::schema::{FieldDescriptor, SchemaDefinition};
use index_sync::search::{FixedProvider, SearchFilters, SortRequest};
use index_sync::storage::InMemoryRecordSource;
use index_sync::sync::{CollectionDescriptor, SearchDomains};
use index_sync::{IndexSyncConfig, SearchableRecord};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║             index-sync: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Records and domain registration
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Seeding records...");
    let records = Arc::new(InMemoryRecordSource::new());
    records.extend([
        SearchableRecord::new(1, "en", "Alpine lakes loop").with_created_at(300).with_field("category", json!("hiking")),
        SearchableRecord::new(2, "en", "Coastal ride").with_created_at(100).with_field("category", json!("cycling")),
        SearchableRecord::new(3, "en", "Alpine hut traverse").with_created_at(200).with_field("category", json!("hiking")),
        SearchableRecord::new(4, "de", "Alpensee Runde").with_created_at(400).with_field("category", json!("hiking")),
        SearchableRecord::new(5, "en", "Abandoned route").with_created_at(50).trashed_at(60),
    ]);
    println!("   {} records", records.len());

    let config = IndexSyncConfig {
        batch_size: 2,
        ..Default::default()
    }
    .with_schema(
        "trails",
        SchemaDefinition::with_fields(vec![
            FieldDescriptor::new("title", "text_edge_ngram"),
            FieldDescriptor::new("category", "string"),
        ]),
    );

    let index = Arc::new(InMemoryIndex::new());
    let domains = SearchDomains::new(index.clone(), config);
    let engine = domains.register(
        "trails",
        CollectionDescriptor::new("trails", records.clone())
            .search_fields(["title"])
            .filter_keys(["category"]),
    )?;

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Schema migration
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧱 Migrating schema...");
    domains.migrate_schema("trails").await?;
    println!("   field types: {:?}", index.field_types("trails"));
    println!("   fields:      {:?}", index.fields("trails"));

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Bulk sync
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔄 Syncing...");
    let report = domains.sync("trails").await?;
    println!(
        "   pushed {} records in {} batches, deleted {}",
        report.pushed.pushed, report.pushed.batches, report.deleted.pushed
    );
    println!("   index now holds {:?}", index.document_ids("trails"));

    engine.sync_one(&SearchableRecord::new(6, "en", "Ridge walk")).await;
    engine.delete_one(2).await;
    println!("   after single-record updates: {:?}", index.document_ids("trails"));

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Routing searches
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Searching...");
    let router = domains.router("trails", Arc::new(FixedProvider::new(index.clone())))?;

    // The in-memory index has no scoring; script the ranking it returns
    index.set_ranking("trails", vec![3, 1]);
    let request = engine.route_request("en").keyword("alpine");
    let page = engine.search(&router, &request, 1, 10).await?;
    println!("   \"alpine\" by relevance → {:?}", ids(&page.items));

    let oldest_first = request.clone().sort(SortRequest::parse(Some("created_data_asc")));
    let page = engine.search(&router, &oldest_first, 1, 10).await?;
    println!("   \"alpine\" oldest first → {:?}", ids(&page.items));

    let requests_before = index.request_count();
    let short = engine.route_request("en").keyword("c");
    let page = engine.search(&router, &short, 1, 10).await?;
    println!(
        "   \"c\" (prefix only)     → {:?}, index calls: {}",
        ids(&page.items),
        index.request_count() - requests_before
    );

    index.set_ranking("trails", vec![1, 3]);
    let filtered = engine
        .route_request("en")
        .filters(SearchFilters::new().with("category", "hiking"));
    let page = engine.search(&router, &filtered, 1, 1).await?;
    println!(
        "   category=hiking       → {:?} (page {}/{}, {} total)",
        ids(&page.items),
        page.meta.current_page,
        page.meta.last_page,
        page.meta.total
    );

    let offline = domains.router("trails", Arc::new(FixedProvider::unavailable()))?;
    let page = engine.search(&offline, &request, 1, 10).await?;
    println!("   index offline         → {:?}", ids(&page.items));

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n✅ Done.");
    Ok(())
}

fn ids(records: &[SearchableRecord]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={count} sum={sum:.4}")
            }
        };
        lines.push(format!("   {}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    for line in lines {
        println!("{line}");
    }
}
