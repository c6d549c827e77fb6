// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for index-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `index_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `collection`: index collection name
//! - `operation`: select, update, delete, schema
//! - `kind`: push, delete (bulk sync direction)
//! - `outcome`: relational, indexed, degraded (route decisions)

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record index request latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "index_sync_request_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record one bulk batch pushed to the index
pub fn record_batch_pushed(collection: &str, kind: &str, records: usize) {
    counter!(
        "index_sync_batches_total",
        "collection" => collection.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
    counter!(
        "index_sync_records_total",
        "collection" => collection.to_string(),
        "kind" => kind.to_string()
    )
    .increment(records as u64);
    histogram!("index_sync_batch_size").record(records as f64);
}

/// Record an empty trailing page that was not pushed
pub fn record_batch_skipped(collection: &str, kind: &str) {
    counter!(
        "index_sync_batches_skipped_total",
        "collection" => collection.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record an aborted bulk sync
pub fn record_sync_failure(collection: &str, kind: &str) {
    counter!(
        "index_sync_failures_total",
        "collection" => collection.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a single-record sync or delete
pub fn record_singleton(collection: &str, kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "index_sync_singleton_total",
        "collection" => collection.to_string(),
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a routing decision
pub fn record_route(collection: &str, outcome: &str) {
    counter!(
        "index_sync_route_total",
        "collection" => collection.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record number of ids returned by an index search
pub fn record_search_results(count: usize) {
    histogram!("index_sync_search_results").record(count as f64);
}

/// Record schema migration call
pub fn record_schema_operation(collection: &str, operation: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "index_sync_schema_operations_total",
        "collection" => collection.to_string(),
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a retried startup/query attempt against the record source
pub fn record_retry(operation: &str) {
    counter!(
        "index_sync_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}
