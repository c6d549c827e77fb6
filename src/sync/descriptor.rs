// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use super::formatter::{PassThroughFormatter, RecordFormatter};
use crate::storage::RecordSource;

/// Everything that distinguishes one searchable domain from another.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use index_sync::storage::InMemoryRecordSource;
/// use index_sync::sync::CollectionDescriptor;
///
/// let descriptor = CollectionDescriptor::new("example", Arc::new(InMemoryRecordSource::new()))
///     .search_fields(["example_1"])
///     .filter_keys(["category"]);
///
/// assert_eq!(descriptor.schema_name, "example");
/// ```
#[derive(Clone)]
pub struct CollectionDescriptor {
    /// Index collection name
    pub collection: String,
    /// Fields the keyword is matched against; the last one is boosted
    pub search_fields: Vec<String>,
    pub record_source: Arc<dyn RecordSource>,
    pub formatter: Arc<dyn RecordFormatter>,
    /// Name of the schema definition migrated for this collection
    pub schema_name: String,
    /// Filter keys honoured by searches
    pub filter_keys: Vec<String>,
}

impl CollectionDescriptor {
    /// Descriptor with a pass-through formatter and the schema named after the collection.
    pub fn new(collection: impl Into<String>, record_source: Arc<dyn RecordSource>) -> Self {
        let collection = collection.into();
        Self {
            schema_name: collection.clone(),
            collection,
            search_fields: Vec::new(),
            record_source,
            formatter: Arc::new(PassThroughFormatter),
            filter_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn search_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.filter_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn formatter(mut self, formatter: Arc<dyn RecordFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = name.into();
        self
    }
}

impl std::fmt::Debug for CollectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("collection", &self.collection)
            .field("search_fields", &self.search_fields)
            .field("schema_name", &self.schema_name)
            .field("filter_keys", &self.filter_keys)
            .finish_non_exhaustive()
    }
}
