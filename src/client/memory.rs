// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory index service.
//!
//! Behaves enough like the real service for sync and routing to be
//! exercised without a network: updates upsert and delete documents,
//! schema commands register names and reject duplicates, and selects return
//! either a scripted ranking or every stored document. Every request is
//! recorded for assertions, and failures can be injected by call number.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{Headers, IndexClient, IndexError, QueryParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// One request as seen by the in-memory index.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
    pub headers: Headers,
}

impl RecordedRequest {
    /// Look up a query parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct CollectionState {
    docs: BTreeMap<i64, Value>,
    field_types: Vec<String>,
    fields: Vec<String>,
}

pub struct InMemoryIndex {
    collections: DashMap<String, CollectionState>,
    /// Scripted select results: collection → ranked ids
    rankings: DashMap<String, Vec<i64>>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
    /// Calls numbered at or above this fail (usize::MAX = never)
    fail_from: AtomicUsize,
    reject_empty_updates: AtomicBool,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            rankings: DashMap::new(),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_from: AtomicUsize::new(usize::MAX),
            reject_empty_updates: AtomicBool::new(false),
        }
    }

    /// Fail every call from the `n`th (0-based) onwards.
    pub fn fail_from_call(&self, n: usize) {
        self.fail_from.store(n, Ordering::SeqCst);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.fail_from.store(usize::MAX, Ordering::SeqCst);
    }

    /// Answer empty update bodies with a 400, as some deployments do.
    pub fn reject_empty_updates(&self, reject: bool) {
        self.reject_empty_updates.store(reject, Ordering::SeqCst);
    }

    /// Make selects on `collection` return these ids in this order.
    pub fn set_ranking(&self, collection: &str, ids: Vec<i64>) {
        self.rankings.insert(collection.to_string(), ids);
    }

    /// All requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Ids currently stored in `collection`, ascending.
    #[must_use]
    pub fn document_ids(&self, collection: &str) -> Vec<i64> {
        self.collections
            .get(collection)
            .map(|state| state.docs.keys().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn document(&self, collection: &str, id: i64) -> Option<Value> {
        self.collections.get(collection)?.docs.get(&id).cloned()
    }

    #[must_use]
    pub fn field_types(&self, collection: &str) -> Vec<String> {
        self.collections
            .get(collection)
            .map(|state| state.field_types.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn fields(&self, collection: &str) -> Vec<String> {
        self.collections
            .get(collection)
            .map(|state| state.fields.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: RecordedRequest) -> Result<(), IndexError> {
        self.requests.lock().push(request);
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_from.load(Ordering::SeqCst) {
            return Err(IndexError::Transport(format!("injected failure on call {call}")));
        }
        Ok(())
    }

    fn apply_update(&self, collection: &str, body: &Value) -> Result<Value, IndexError> {
        let mut state = self.collections.entry(collection.to_string()).or_default();

        match body {
            Value::Array(docs) => {
                if docs.is_empty() && self.reject_empty_updates.load(Ordering::SeqCst) {
                    return Err(bad_request("empty update body"));
                }
                for doc in docs {
                    let id = doc_id(doc.get("id")).ok_or_else(|| bad_request("document without id"))?;
                    state.docs.insert(id, doc.clone());
                }
            }
            Value::Object(map) => match map.get("delete") {
                Some(Value::Array(ids)) => {
                    if ids.is_empty() && self.reject_empty_updates.load(Ordering::SeqCst) {
                        return Err(bad_request("empty delete list"));
                    }
                    for id in ids {
                        if let Some(id) = doc_id(Some(id)) {
                            state.docs.remove(&id);
                        }
                    }
                }
                Some(Value::Object(target)) => {
                    if let Some(id) = doc_id(target.get("id")) {
                        state.docs.remove(&id);
                    }
                }
                _ => return Err(bad_request("unsupported update command")),
            },
            _ => return Err(bad_request("unsupported update body")),
        }

        Ok(json!({"responseHeader": {"status": 0}}))
    }

    fn apply_schema(&self, collection: &str, body: &Value) -> Result<Value, IndexError> {
        let mut state = self.collections.entry(collection.to_string()).or_default();

        if let Some(field_type) = body.get("add-field-type") {
            let name = field_type
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request("field type without name"))?;
            if state.field_types.iter().any(|t| t == name) {
                return Err(bad_request(&format!("Field type '{name}' already exists.")));
            }
            state.field_types.push(name.to_string());
        } else if let Some(Value::Array(fields)) = body.get("add-field") {
            let names: Vec<String> = fields
                .iter()
                .filter_map(|f| f.get("name").and_then(Value::as_str).map(String::from))
                .collect();
            if let Some(dup) = names.iter().find(|n| state.fields.contains(n)) {
                return Err(bad_request(&format!("Field '{dup}' already exists.")));
            }
            state.fields.extend(names);
        } else {
            return Err(bad_request("unsupported schema command"));
        }

        Ok(json!({"responseHeader": {"status": 0}}))
    }

    fn select(&self, collection: &str, query: &QueryParams) -> Value {
        let rows = query
            .iter()
            .find(|(k, _)| k == "rows")
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(10);

        let docs: Vec<Value> = match self.rankings.get(collection) {
            Some(ranking) => ranking.iter().map(|id| json!({ "id": id.to_string() })).collect(),
            None => self
                .collections
                .get(collection)
                .map(|state| state.docs.values().cloned().collect())
                .unwrap_or_default(),
        };
        let num_found = docs.len();
        let docs: Vec<Value> = docs.into_iter().take(rows).collect();

        json!({"response": {"numFound": num_found, "start": 0, "docs": docs}})
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn bad_request(message: &str) -> IndexError {
    IndexError::Status {
        status: 400,
        body: message.to_string(),
    }
}

fn doc_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Split "/<collection>/<action>?query" into its parts.
fn route(path: &str) -> Option<(&str, &str)> {
    let path = path.split('?').next().unwrap_or(path);
    let mut segments = path.trim_start_matches('/').splitn(2, '/');
    Some((segments.next()?, segments.next()?))
}

#[async_trait]
impl IndexClient for InMemoryIndex {
    async fn get(&self, path: &str, query: &QueryParams, headers: &Headers) -> Result<Value, IndexError> {
        self.record(RecordedRequest {
            method: Method::Get,
            path: path.to_string(),
            query: query.clone(),
            body: None,
            headers: headers.clone(),
        })?;

        match route(path) {
            Some((collection, "select")) => Ok(self.select(collection, query)),
            _ => Err(IndexError::Status { status: 404, body: format!("no handler for GET {path}") }),
        }
    }

    async fn post(&self, path: &str, body: &Value, headers: &Headers) -> Result<Value, IndexError> {
        self.record(RecordedRequest {
            method: Method::Post,
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body.clone()),
            headers: headers.clone(),
        })?;

        match route(path) {
            Some((collection, "update")) => self.apply_update(collection, body),
            Some((collection, "schema")) => self.apply_schema(collection, body),
            _ => Err(IndexError::Status { status: 404, body: format!("no handler for POST {path}") }),
        }
    }

    async fn delete(&self, path: &str, headers: &Headers) -> Result<Value, IndexError> {
        self.record(RecordedRequest {
            method: Method::Delete,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            headers: headers.clone(),
        })?;

        match route(path) {
            Some((collection, _)) if self.collections.remove(collection).is_some() => {
                Ok(json!({"responseHeader": {"status": 0}}))
            }
            _ => Err(IndexError::Status { status: 404, body: format!("no collection at {path}") }),
        }
    }
}
