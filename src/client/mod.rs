// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index service client seam.
//!
//! The transport itself (HTTP, auth, TLS) belongs to the host application.
//! This module defines the trait it implements, the shapes of the requests
//! the crate sends, and an in-memory implementation for tests and demos.
//!
//! ```text
//! IndexSyncEngine / ResultRouter / SchemaMigrator
//!     ↓
//! IndexCollection   (paths, params, headers, body shapes)
//!     ↓
//! dyn IndexClient   (GET / POST / DELETE)
//!     ↓
//! remote index service
//! ```

mod endpoints;
mod memory;

pub use endpoints::{IndexCollection, QueryString, SelectResponse, UpdateCommand};
pub use memory::{InMemoryIndex, Method, RecordedRequest};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Request headers, merged case-sensitively by name.
pub type Headers = BTreeMap<String, String>;

/// Ordered query-string parameters.
pub type QueryParams = Vec<(String, String)>;

/// Failure talking to the index service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The service answered with a non-success status
    #[error("index service returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never got a response
    #[error("index transport error: {0}")]
    Transport(String),
    /// The response body was not what the caller expected
    #[error("unexpected index response: {0}")]
    Decode(String),
}

/// Transport for the index service's HTTP/JSON API.
///
/// Implementations resolve `path` against their base URL, attach
/// credentials, send `headers` as given and return the decoded JSON body.
/// Any non-2xx response must surface as [`IndexError::Status`].
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn get(&self, path: &str, query: &QueryParams, headers: &Headers) -> Result<Value, IndexError>;
    async fn post(&self, path: &str, body: &Value, headers: &Headers) -> Result<Value, IndexError>;
    async fn delete(&self, path: &str, headers: &Headers) -> Result<Value, IndexError>;
}
