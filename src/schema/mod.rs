// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema definitions and their migration.
//!
//! Schemas are additive: fields and field types are pushed to the index's
//! schema endpoint and never diffed or retracted. Definitions come from
//! configuration and are looked up by name in a [`SchemaRegistry`].
//!
//! # Example
//!
//! ```rust
//! use index_sync::schema::{FieldDescriptor, SchemaDefinition, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new();
//! registry.register(
//!     "example",
//!     SchemaDefinition::with_fields(vec![
//!         FieldDescriptor::new("example_1", "text_edge_ngram"),
//!         FieldDescriptor::new("example_2", "text_general"),
//!     ]),
//! );
//!
//! assert_eq!(registry.get("example").unwrap().fields.len(), 2);
//! assert!(registry.get("missing").is_none());
//! ```
//!
//! # Design
//!
//! - **Named definitions**: one definition per collection schema name
//! - **Read-mostly**: registered at startup, read on every migration
//! - **Thread-safe**: uses `parking_lot::RwLock` for concurrent access

mod migrator;

pub use migrator::{SchemaError, SchemaMigrator};

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One field in an index collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default = "default_true")]
    pub indexed: bool,
    #[serde(default = "default_true")]
    pub stored: bool,
    #[serde(rename = "multiValued", default)]
    pub multi_valued: bool,
}

fn default_true() -> bool { true }

impl FieldDescriptor {
    /// Indexed, stored, single-valued field of the given type.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            indexed: true,
            stored: true,
            multi_valued: false,
        }
    }

    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }
}

/// A tokenizer or filter factory with its parameters.
///
/// Serializes as `{"class": "...", <params>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    pub class: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl FactoryConfig {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            params: Map::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Tokenizer plus ordered filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub tokenizer: FactoryConfig,
    #[serde(default)]
    pub filters: Vec<FactoryConfig>,
}

/// A custom field type with its analyzer chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeDescriptor {
    pub name: String,
    pub class: String,
    #[serde(rename = "positionIncrementGap", default, skip_serializing_if = "Option::is_none")]
    pub position_increment_gap: Option<u32>,
    pub analyzer: AnalyzerConfig,
}

impl FieldTypeDescriptor {
    /// Edge n-gram text type used for prefix/typeahead matching.
    ///
    /// Standard tokenizer, lower-cased, then every 2..=20 character prefix
    /// of each token is indexed.
    #[must_use]
    pub fn edge_ngram() -> Self {
        Self {
            name: "text_edge_ngram".to_string(),
            class: "solr.TextField".to_string(),
            position_increment_gap: Some(100),
            analyzer: AnalyzerConfig {
                tokenizer: FactoryConfig::new("solr.StandardTokenizerFactory"),
                filters: vec![
                    FactoryConfig::new("solr.LowerCaseFilterFactory"),
                    FactoryConfig::new("solr.EdgeNGramFilterFactory")
                        .param("minGramSize", 2)
                        .param("maxGramSize", 20),
                ],
            },
        }
    }
}

/// Fields and field types making up one collection schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub field_types: Vec<FieldTypeDescriptor>,
}

impl SchemaDefinition {
    #[must_use]
    pub fn with_fields(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            fields,
            field_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.field_types.is_empty()
    }
}

/// Registry of named schema definitions.
///
/// Thread-safe for concurrent reads with occasional writes.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    definitions: RwLock<BTreeMap<String, SchemaDefinition>>,
}

impl SchemaRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured definitions.
    #[must_use]
    pub fn from_definitions(definitions: BTreeMap<String, SchemaDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
        }
    }

    /// Register or replace a named definition.
    pub fn register(&self, name: &str, definition: SchemaDefinition) {
        self.definitions.write().insert(name.to_string(), definition);
    }

    /// Returns `true` if the name was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.definitions.write().remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<SchemaDefinition> {
        self.definitions.read().get(name).cloned()
    }

    /// Registered schema names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}
