// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational record sources.
//!
//! - [`InMemoryRecordSource`]: ordered map, for tests and demos
//! - [`SqlRecordSource`]: SQLite or MySQL through the sqlx `Any` driver

pub mod traits;
pub mod memory;
pub mod sql;

pub use traits::{RecordSource, RecordView, StorageError, WhereClause};
pub use memory::InMemoryRecordSource;
pub use sql::SqlRecordSource;
