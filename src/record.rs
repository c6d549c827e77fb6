// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record and document types.
//!
//! A [`SearchableRecord`] is a row owned by the relational store. The
//! formatter turns it into an [`IndexDocument`], which only lives for the
//! duration of one push.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A relational row that is mirrored into the search index.
///
/// # Example
///
/// ```
/// use index_sync::SearchableRecord;
/// use serde_json::json;
///
/// let record = SearchableRecord::new(42, "en", "Alpine lakes")
///     .with_field("summary", json!("Cold water, steep shores"));
///
/// assert_eq!(record.id, 42);
/// assert!(!record.is_deleted());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableRecord {
    /// Primary key, shared with the index document
    pub id: i64,
    /// Soft-delete marker (epoch millis); `Some` means trashed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// Creation timestamp (epoch millis)
    pub created_at: i64,
    /// Language tag the row was authored in (e.g. "en")
    pub language: String,
    /// Display title, used for relational prefix matching
    pub title: String,
    /// Remaining queryable columns
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SearchableRecord {
    /// Create a live record stamped with the current time.
    pub fn new(id: i64, language: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            deleted_at: None,
            created_at: now_millis(),
            language: language.into(),
            title: title.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Mark the record as soft-deleted at `deleted_at`.
    #[must_use]
    pub fn trashed_at(mut self, deleted_at: i64) -> Self {
        self.deleted_at = Some(deleted_at);
        self
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Look up a column by name, including the fixed columns.
    ///
    /// Used by where-clause matching so callers can filter on `language`
    /// or `title` the same way they filter on free-form fields.
    pub fn column(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "language" => Some(Value::from(self.language.clone())),
            "title" => Some(Value::from(self.title.clone())),
            "created_at" => Some(Value::from(self.created_at)),
            "deleted_at" => self.deleted_at.map(Value::from),
            other => self.fields.get(other).cloned(),
        }
    }
}

/// A document as pushed to the index.
///
/// Serializes flat: `{"id": 42, "title": "...", ...}`. The `id` is always
/// the id of the record it was formatted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IndexDocument {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Set a single- or multi-valued field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        // "id" is owned by the struct; a stray field would shadow it on the wire
        if name != "id" {
            self.fields.insert(name, value.into());
        }
        self
    }

    /// The wire form: a flat JSON object carrying `id` alongside the fields.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("id".to_string(), Value::from(self.id));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
