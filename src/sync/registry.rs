// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Named search domains sharing one index client and configuration.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::info;

use super::descriptor::CollectionDescriptor;
use super::engine::{IndexSyncEngine, SyncError, SyncReport};
use crate::client::IndexClient;
use crate::config::IndexSyncConfig;
use crate::schema::{SchemaError, SchemaRegistry};
use crate::search::{IndexProvider, ResultRouter};
use crate::storage::WhereClause;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("unknown search domain: {0}")]
    UnknownDomain(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Reports from a [`SearchDomains::sync`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainSyncReport {
    pub pushed: SyncReport,
    pub deleted: SyncReport,
}

/// Lookup table of sync engines keyed by domain name.
pub struct SearchDomains {
    client: Arc<dyn IndexClient>,
    config: IndexSyncConfig,
    schemas: Arc<SchemaRegistry>,
    domains: DashMap<String, Arc<IndexSyncEngine>>,
}

impl SearchDomains {
    pub fn new(client: Arc<dyn IndexClient>, config: IndexSyncConfig) -> Self {
        let schemas = Arc::new(SchemaRegistry::from_definitions(config.schemas.clone()));
        Self {
            client,
            config,
            schemas,
            domains: DashMap::new(),
        }
    }

    /// Schema definitions shared by every domain's migrator.
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Build an engine for `descriptor` and register it under `name`,
    /// replacing any previous registration.
    pub fn register(
        &self,
        name: impl Into<String>,
        descriptor: CollectionDescriptor,
    ) -> Result<Arc<IndexSyncEngine>, SyncError> {
        let name = name.into();
        let engine = Arc::new(IndexSyncEngine::new(
            descriptor,
            self.client.clone(),
            &self.config,
            self.schemas.clone(),
        )?);
        info!(domain = %name, collection = engine.collection_name(), "Search domain registered");
        self.domains.insert(name, engine.clone());
        Ok(engine)
    }

    pub fn get(&self, name: &str) -> Result<Arc<IndexSyncEngine>, DomainError> {
        self.domains
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DomainError::UnknownDomain(name.to_string()))
    }

    /// Registered domain names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn router(&self, name: &str, provider: Arc<dyn IndexProvider>) -> Result<ResultRouter, DomainError> {
        Ok(self.get(name)?.router(provider))
    }

    /// Field types, then the domain's field list.
    pub async fn migrate_schema(&self, name: &str) -> Result<(), DomainError> {
        let engine = self.get(name)?;
        let schema_name = engine.descriptor().schema_name.clone();
        engine.migrator().migrate_all(&schema_name).await?;
        info!(domain = name, schema = %schema_name, "Schema migrated");
        Ok(())
    }

    /// Full sync of active records, then removal of soft-deleted ones.
    pub async fn sync(&self, name: &str) -> Result<DomainSyncReport, DomainError> {
        let engine = self.get(name)?;
        let everything = WhereClause::new();

        let pushed = engine.full_sync(&everything).await?;
        let deleted = engine.delete_sync(&everything).await?;
        Ok(DomainSyncReport { pushed, deleted })
    }
}

impl std::fmt::Debug for SearchDomains {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchDomains")
            .field("domains", &self.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
