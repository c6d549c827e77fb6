// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::client::{IndexCollection, IndexError};
use crate::metrics;

use super::{FieldTypeDescriptor, SchemaRegistry};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("no schema definition named '{0}'")]
    UnknownSchema(String),

    #[error("schema push failed: {0}")]
    Index(#[from] IndexError),
}

/// Pushes additive schema changes to one collection.
///
/// Neither call is idempotent: the index rejects a field or field type whose
/// name already exists, so a second migration of the same definition fails.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    collection: IndexCollection,
    registry: Arc<SchemaRegistry>,
    field_types: Vec<FieldTypeDescriptor>,
}

impl SchemaMigrator {
    pub fn new(
        collection: IndexCollection,
        registry: Arc<SchemaRegistry>,
        field_types: Vec<FieldTypeDescriptor>,
    ) -> Self {
        Self {
            collection,
            registry,
            field_types,
        }
    }

    /// Field types pushed by [`migrate_field_types`](Self::migrate_field_types).
    #[must_use]
    pub fn field_types(&self) -> &[FieldTypeDescriptor] {
        &self.field_types
    }

    /// Push one field type: `{"add-field-type": {...}}`.
    pub async fn migrate_field_type(&self, definition: &FieldTypeDescriptor) -> Result<Value, SchemaError> {
        let body = json!({ "add-field-type": definition });
        let result = self.collection.schema(&body).await;
        self.observe("add-field-type", &definition.name, &result);
        Ok(result?)
    }

    /// Push every configured field type, one call each, stopping at the first failure.
    pub async fn migrate_field_types(&self) -> Result<usize, SchemaError> {
        for definition in &self.field_types {
            self.migrate_field_type(definition).await?;
        }
        Ok(self.field_types.len())
    }

    /// Push the field list of the named definition as one `{"add-field": [...]}` call.
    pub async fn migrate_fields(&self, schema_name: &str) -> Result<Value, SchemaError> {
        let definition = self
            .registry
            .get(schema_name)
            .ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;

        let body = json!({ "add-field": definition.fields });
        let result = self.collection.schema(&body).await;
        self.observe("add-field", schema_name, &result);
        Ok(result?)
    }

    /// Field types first (configured, then any carried by the definition), then fields.
    pub async fn migrate_all(&self, schema_name: &str) -> Result<(), SchemaError> {
        let definition = self
            .registry
            .get(schema_name)
            .ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;

        self.migrate_field_types().await?;
        for field_type in &definition.field_types {
            self.migrate_field_type(field_type).await?;
        }
        self.migrate_fields(schema_name).await?;
        Ok(())
    }

    fn observe(&self, operation: &str, name: &str, result: &Result<Value, IndexError>) {
        let collection = self.collection.name();
        match result {
            Ok(_) => {
                info!(collection, operation, name, "Schema change applied");
                metrics::record_schema_operation(collection, operation, true);
            }
            Err(e) => {
                error!(collection, operation, name, error = %e, "Schema change rejected");
                metrics::record_schema_operation(collection, operation, false);
            }
        }
    }
}
