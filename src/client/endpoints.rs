// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection-scoped requests against the index service.
//!
//! # Wire Shapes
//!
//! ```text
//! GET  /<collection>/select?q=..&start=0&rows=..&spellcheck=true&defType=edismax
//!                          &spellcheck.collate=true&wt=json&indent=true
//!      → {"response": {"docs": [...], "numFound": N}}
//! POST /<collection>/update?commit=true   [doc, doc, ...]
//!                                         {"delete": [id, id, ...]}
//!                                         {"delete": {"id": id}}
//! POST /<collection>/schema               {"add-field-type": {...}}
//!                                         {"add-field": [...]}
//! ```

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::metrics;
use crate::record::IndexDocument;

use super::{Headers, IndexClient, IndexError, QueryParams};

/// A translated index query, sent as the `q` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString(String);

impl QueryString {
    /// Query-parameter name the index reads the query from.
    pub const PARAM: &'static str = "q";

    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for QueryString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a `POST /<collection>/update?commit=true`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCommand {
    /// Add or replace documents
    Documents(Vec<IndexDocument>),
    /// Delete a batch of ids
    Delete(Vec<i64>),
    /// Delete one id
    DeleteOne(i64),
}

impl UpdateCommand {
    #[must_use]
    pub fn to_body(&self) -> Value {
        match self {
            Self::Documents(docs) => Value::Array(docs.iter().map(IndexDocument::to_json).collect()),
            Self::Delete(ids) => json!({ "delete": ids }),
            Self::DeleteOne(id) => json!({ "delete": { "id": id } }),
        }
    }

    /// Number of documents or ids carried.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Documents(docs) => docs.len(),
            Self::Delete(ids) => ids.len(),
            Self::DeleteOne(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Documents(_) => "update",
            Self::Delete(_) | Self::DeleteOne(_) => "delete",
        }
    }
}

/// Documents returned by a select, in the index's relevance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResponse {
    pub docs: Vec<Value>,
    pub num_found: u64,
}

impl SelectResponse {
    /// Decode `{"response": {"docs": [...], "numFound": N}}`.
    ///
    /// A body without a `response` member decodes to an empty result.
    pub fn from_body(body: &Value) -> Result<Self, IndexError> {
        let Some(response) = body.get("response") else {
            return Ok(Self::default());
        };

        let docs = match response.get("docs") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(docs)) => docs.clone(),
            Some(other) => {
                return Err(IndexError::Decode(format!("response.docs is not an array: {other}")));
            }
        };
        let num_found = response
            .get("numFound")
            .and_then(Value::as_u64)
            .unwrap_or(docs.len() as u64);

        Ok(Self { docs, num_found })
    }

    /// Document ids coerced to integers, preserving rank order.
    ///
    /// Numeric ids and numeric strings are kept; anything else is dropped.
    #[must_use]
    pub fn ids(&self) -> Vec<i64> {
        self.docs
            .iter()
            .filter_map(|doc| match doc.get("id")? {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            })
            .collect()
    }
}

/// A client bound to one collection, with the headers every request carries.
#[derive(Clone)]
pub struct IndexCollection {
    client: Arc<dyn IndexClient>,
    name: String,
    headers: Headers,
}

impl std::fmt::Debug for IndexCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCollection")
            .field("name", &self.name)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl IndexCollection {
    pub fn new(client: Arc<dyn IndexClient>, name: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            client,
            name: name.into(),
            headers,
        }
    }

    /// Merge caller headers over the defaults; the caller wins on conflicts.
    #[must_use]
    pub fn with_headers(mut self, extra: &Headers) -> Self {
        for (name, value) in extra {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn select_path(&self) -> String {
        format!("/{}/select", self.name)
    }

    #[must_use]
    pub fn update_path(&self) -> String {
        format!("/{}/update?commit=true", self.name)
    }

    #[must_use]
    pub fn schema_path(&self) -> String {
        format!("/{}/schema", self.name)
    }

    /// Parameters for a select: the query plus the fixed edismax/spellcheck set.
    #[must_use]
    pub fn select_params(query: &QueryString, rows: u32) -> QueryParams {
        vec![
            (QueryString::PARAM.to_string(), query.as_str().to_string()),
            ("start".to_string(), "0".to_string()),
            ("rows".to_string(), rows.to_string()),
            ("spellcheck".to_string(), "true".to_string()),
            ("defType".to_string(), "edismax".to_string()),
            ("spellcheck.collate".to_string(), "true".to_string()),
            ("wt".to_string(), "json".to_string()),
            ("indent".to_string(), "true".to_string()),
        ]
    }

    /// Run a query, fetching at most `rows` documents from offset 0.
    pub async fn select(&self, query: &QueryString, rows: u32) -> Result<SelectResponse, IndexError> {
        let _timer = metrics::LatencyTimer::new("select");
        debug!(collection = %self.name, query = %query, rows, "Index select");

        let body = self
            .client
            .get(&self.select_path(), &Self::select_params(query, rows), &self.headers)
            .await?;
        SelectResponse::from_body(&body)
    }

    /// Push an update with immediate commit.
    pub async fn update(&self, command: &UpdateCommand) -> Result<Value, IndexError> {
        let _timer = metrics::LatencyTimer::new(command.kind());
        debug!(collection = %self.name, kind = command.kind(), size = command.len(), "Index update");

        self.client
            .post(&self.update_path(), &command.to_body(), &self.headers)
            .await
    }

    /// Push a schema API command.
    pub async fn schema(&self, body: &Value) -> Result<Value, IndexError> {
        let _timer = metrics::LatencyTimer::new("schema");
        self.client.post(&self.schema_path(), body, &self.headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryIndex;

    #[test]
    fn test_paths() {
        let collection = IndexCollection::new(Arc::new(InMemoryIndex::new()), "example");
        assert_eq!(collection.select_path(), "/example/select");
        assert_eq!(collection.update_path(), "/example/update?commit=true");
        assert_eq!(collection.schema_path(), "/example/schema");
    }

    #[test]
    fn test_default_headers_and_override() {
        let mut extra = Headers::new();
        extra.insert("X-Trace".to_string(), "abc".to_string());
        extra.insert("Content-Type".to_string(), "application/json; charset=utf-8".to_string());

        let collection = IndexCollection::new(Arc::new(InMemoryIndex::new()), "example").with_headers(&extra);

        assert_eq!(collection.headers().get("X-Trace").map(String::as_str), Some("abc"));
        assert_eq!(
            collection.headers().get("Content-Type").map(String::as_str),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn test_select_params() {
        let params = IndexCollection::select_params(&QueryString::new("title:\"x\"^20 "), 2000);
        let get = |k: &str| params.iter().find(|(name, _)| name == k).map(|(_, v)| v.as_str());

        assert_eq!(get("q"), Some("title:\"x\"^20 "));
        assert_eq!(get("start"), Some("0"));
        assert_eq!(get("rows"), Some("2000"));
        assert_eq!(get("spellcheck"), Some("true"));
        assert_eq!(get("defType"), Some("edismax"));
        assert_eq!(get("spellcheck.collate"), Some("true"));
        assert_eq!(get("wt"), Some("json"));
        assert_eq!(get("indent"), Some("true"));
    }

    #[test]
    fn test_update_bodies() {
        let docs = UpdateCommand::Documents(vec![IndexDocument::new(1).field("title", "a")]);
        assert_eq!(docs.to_body(), json!([{"id": 1, "title": "a"}]));

        assert_eq!(UpdateCommand::Delete(vec![3, 4]).to_body(), json!({"delete": [3, 4]}));
        assert_eq!(UpdateCommand::DeleteOne(9).to_body(), json!({"delete": {"id": 9}}));
        assert!(UpdateCommand::Delete(vec![]).is_empty());
    }

    #[test]
    fn test_select_response_decoding() {
        let body = json!({"response": {"numFound": 3, "docs": [{"id": "12"}, {"id": 7}, {"id": "x"}]}});
        let response = SelectResponse::from_body(&body).unwrap();

        assert_eq!(response.num_found, 3);
        assert_eq!(response.ids(), vec![12, 7]);
    }

    #[test]
    fn test_select_response_missing_response_is_empty() {
        let response = SelectResponse::from_body(&json!({})).unwrap();
        assert!(response.docs.is_empty());
        assert_eq!(response.num_found, 0);
    }

    #[test]
    fn test_select_response_rejects_non_array_docs() {
        let body = json!({"response": {"docs": "nope"}});
        assert!(matches!(SelectResponse::from_body(&body), Err(IndexError::Decode(_))));
    }
}
