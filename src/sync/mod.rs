// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pushing relational records to index collections.
//!
//! One [`IndexSyncEngine`] per collection, configured by a
//! [`CollectionDescriptor`] and registered by name in [`SearchDomains`].

mod descriptor;
mod engine;
mod formatter;
mod registry;

pub use descriptor::CollectionDescriptor;
pub use engine::{IndexSyncEngine, SyncError, SyncKind, SyncReport};
pub use formatter::{FormatError, PassThroughFormatter, RecordFormatter};
pub use registry::{DomainError, DomainSyncReport, SearchDomains};
