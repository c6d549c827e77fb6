// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Result routing between the relational store and the index.
//!
//! # Decision Flow
//!
//! ```text
//! language = locale ──► keyword present but ≤ 1 char? ──► title LIKE 'k%'
//!                                │
//!                                ▼
//!        nothing search-worthy, no valid filter, no raw query? ──► done (relational)
//!                                │
//!                                ▼
//!              accessor available? ── no ──► done (degraded)
//!                                │ yes
//!                                ▼
//!          select ──► id IN (ranked ids) ──► ORDER BY created_at | rank
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{Headers, IndexClient, IndexCollection};
use crate::metrics;

use super::filters::SearchFilters;
use super::predicate::{RecordOrder, RecordPredicate, SortRequest};
use super::query_translator::{sanitize_keyword, QueryTranslator};

/// Default cap on ids fetched from the index per search.
pub const DEFAULT_SEARCH_ROWS: u32 = 2000;

/// Supplies an index client on demand, or nothing when none can be bound.
pub trait IndexProvider: Send + Sync {
    fn accessor(&self) -> Option<Arc<dyn IndexClient>>;
}

impl<F> IndexProvider for F
where
    F: Fn() -> Option<Arc<dyn IndexClient>> + Send + Sync,
{
    fn accessor(&self) -> Option<Arc<dyn IndexClient>> {
        self()
    }
}

/// A provider that always returns the same client (or never returns one).
#[derive(Clone, Default)]
pub struct FixedProvider(Option<Arc<dyn IndexClient>>);

impl FixedProvider {
    pub fn new(client: Arc<dyn IndexClient>) -> Self {
        Self(Some(client))
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl IndexProvider for FixedProvider {
    fn accessor(&self) -> Option<Arc<dyn IndexClient>> {
        self.0.clone()
    }
}

/// A search request as issued by business code.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub keyword: Option<String>,
    pub filters: SearchFilters,
    pub additional_query: Option<String>,
    pub rows: u32,
    pub locale: String,
    pub sort: SortRequest,
}

impl RouteRequest {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            keyword: None,
            filters: SearchFilters::new(),
            additional_query: None,
            rows: DEFAULT_SEARCH_ROWS,
            locale: locale.into(),
            sort: SortRequest::Relevance,
        }
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn additional_query(mut self, query: impl Into<String>) -> Self {
        self.additional_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortRequest) -> Self {
        self.sort = sort;
        self
    }
}

/// How a route was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The index was not needed
    Relational,
    /// The index was queried and returned `ids` usable ids
    Indexed { ids: usize },
    /// The index was needed but no accessor could be bound
    Degraded,
}

impl RouteOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Indexed { .. } => "indexed",
            Self::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub predicate: RecordPredicate,
    pub outcome: RouteOutcome,
}

/// Resolves search requests for one collection into relational predicates.
pub struct ResultRouter {
    collection: String,
    translator: QueryTranslator,
    filter_keys: Vec<String>,
    headers: Headers,
    provider: Arc<dyn IndexProvider>,
}

impl ResultRouter {
    pub fn new(
        collection: impl Into<String>,
        translator: QueryTranslator,
        filter_keys: Vec<String>,
        provider: Arc<dyn IndexProvider>,
    ) -> Self {
        Self {
            collection: collection.into(),
            translator,
            filter_keys,
            headers: Headers::new(),
            provider,
        }
    }

    /// Extra headers sent with index searches.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Resolve a request to a predicate. Never fails: index problems degrade
    /// to the relational predicate.
    pub async fn route(&self, request: &RouteRequest) -> RecordPredicate {
        self.route_with_outcome(request).await.predicate
    }

    pub async fn route_with_outcome(&self, request: &RouteRequest) -> RouteDecision {
        let decision = self.resolve(request).await;
        metrics::record_route(&self.collection, decision.outcome.label());
        decision
    }

    async fn resolve(&self, request: &RouteRequest) -> RouteDecision {
        let mut predicate = RecordPredicate::new(request.locale.clone());

        let validated = request.filters.validate(self.filter_keys.as_slice());
        let keyword = request
            .keyword
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(sanitize_keyword);
        let search_worthy = keyword
            .as_deref()
            .is_some_and(|k| k.trim().chars().count() > 1);
        let additional_query = request.additional_query.as_deref().filter(|q| !q.is_empty());

        if let Some(short) = keyword.as_deref().filter(|_| !search_worthy) {
            predicate = predicate.with_title_prefix(short);
        }

        if !search_worthy && !validated.is_valid && additional_query.is_none() {
            return RouteDecision {
                predicate,
                outcome: RouteOutcome::Relational,
            };
        }

        let Some(client) = self.provider.accessor() else {
            warn!(collection = %self.collection, "Index unavailable, falling back to relational search");
            return RouteDecision {
                predicate,
                outcome: RouteOutcome::Degraded,
            };
        };

        let query = self
            .translator
            .build(keyword.as_deref(), &validated.filters, additional_query);

        let collection = IndexCollection::new(client, self.collection.clone()).with_headers(&self.headers);
        let ids = match collection.select(&query, request.rows).await {
            Ok(response) => response.ids(),
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Index search failed, treating as no matches");
                Vec::new()
            }
        };
        debug!(collection = %self.collection, matches = ids.len(), "Index search resolved");
        metrics::record_search_results(ids.len());

        let order = match request.sort.created_direction() {
            Some(direction) => RecordOrder::CreatedAt(direction),
            None => RecordOrder::Ranked,
        };
        let outcome = RouteOutcome::Indexed { ids: ids.len() };

        RouteDecision {
            predicate: predicate.with_ids(ids).ordered_by(order),
            outcome,
        }
    }
}
