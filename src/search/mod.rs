// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Keyword + filter search resolved through the index, then narrowed and
//! ordered in the relational store.
//!
//! # Architecture
//!
//! ```text
//! RouteRequest
//!     ↓
//! ResultRouter ──→ QueryTranslator → q=title:"kw"^20 ... → index select
//!     ↓                                                       ↓
//! RecordPredicate  ←──────────── ranked ids ──────────────────┘
//!     ↓
//!     ├─→ SqlTranslator → WHERE ... ORDER BY CASE id ...
//!     └─→ RecordPredicate::apply (in-memory)
//! ```
//!
//! # Index Query Language
//!
//! ```text
//! title:"alps"^20                   - Boosted phrase on the last search field
//! title:"alps" AND body:"alps"^20   - Phrase over several fields
//! category:hiking                   - Scalar filter
//! tags:(alpine OR lakes)            - List filter (OR)
//! (...) AND status:published        - Raw query appended
//! ```

mod filters;
mod pagination;
mod predicate;
mod query_translator;
mod router;
mod sql_translator;

pub use filters::{FilterValue, SearchFilters, ValidatedFilters};
pub use pagination::{prepare_meta_data, Page, PageMeta};
pub use predicate::{RecordOrder, RecordPredicate, SortDirection, SortRequest};
pub use query_translator::{sanitize_keyword, QueryTranslator, DEFAULT_BOOST, ESCAPED_CHARS};
pub use router::{
    FixedProvider, IndexProvider, ResultRouter, RouteDecision, RouteOutcome, RouteRequest, DEFAULT_SEARCH_ROWS,
};
pub use sql_translator::{SqlDialect, SqlParam, SqlQuery, SqlTranslator, FIELDS_COLUMN, FIXED_COLUMNS};
