//! # Index Sync
//!
//! Keeps a full-text index service in step with a relational record store,
//! and routes searches between the two.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Record Source                          │
//! │  • count / ordered paged fetch / soft-deleted view          │
//! │  • SQLite or MySQL via sqlx, or in-memory                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              (BatchPlanner windows, RecordFormatter)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     IndexSyncEngine                         │
//! │  • full_sync / delete_sync, one bulk update per page        │
//! │  • sync_one / delete_one, failures swallowed                │
//! │  • SchemaMigrator: field types, then fields                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 (IndexClient: select / update / schema)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Index Service                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 (QueryTranslator → ranked ids)
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ResultRouter                           │
//! │  • keyword + filters → RecordPredicate over the store       │
//! │  • degrades to relational-only when no client is bound      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use index_sync::client::InMemoryIndex;
//! use index_sync::storage::InMemoryRecordSource;
//! use index_sync::sync::{CollectionDescriptor, SearchDomains};
//! use index_sync::{IndexSyncConfig, SearchableRecord};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let index = Arc::new(InMemoryIndex::new());
//! let records = Arc::new(InMemoryRecordSource::new());
//! records.extend((1..=3).map(|id| SearchableRecord::new(id, "en", format!("trail {id}"))));
//!
//! let domains = SearchDomains::new(index.clone(), IndexSyncConfig::default());
//! domains
//!     .register("trails", CollectionDescriptor::new("trails", records).search_fields(["title"]))
//!     .unwrap();
//!
//! let report = domains.sync("trails").await.unwrap();
//! assert_eq!(report.pushed.pushed, 3);
//! assert_eq!(index.document_ids("trails"), vec![1, 2, 3]);
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`batching`]: offset window planning
//! - [`client`]: index transport trait, endpoints and an in-memory index
//! - [`schema`]: field definitions and the schema migrator
//! - [`search`]: query translation, routing, predicates and pagination
//! - [`storage`]: record sources (SQL, memory)
//! - [`sync`]: the sync engine and the search domain registry
//! - [`resilience`]: retry with backoff

pub mod batching;
pub mod client;
pub mod config;
pub mod metrics;
pub mod record;
pub mod resilience;
pub mod schema;
pub mod search;
pub mod storage;
pub mod sync;

pub use batching::{BatchPlanner, BatchWindow};
pub use client::{IndexClient, IndexError};
pub use config::{EmptyBatchPolicy, IndexSyncConfig};
pub use metrics::LatencyTimer;
pub use record::{IndexDocument, SearchableRecord};
pub use resilience::retry::RetryConfig;
pub use search::{ResultRouter, RouteRequest};
pub use storage::{RecordSource, StorageError};
pub use sync::{CollectionDescriptor, IndexSyncEngine, SearchDomains, SyncError};
