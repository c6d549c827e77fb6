// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL record source.
//!
//! Records live in one table per domain, fixed columns plus a JSON `fields`
//! column for everything else:
//! ```sql
//! CREATE TABLE searchable_records (
//!   id BIGINT PRIMARY KEY,
//!   language VARCHAR(16) NOT NULL,
//!   title VARCHAR(512) NOT NULL,
//!   created_at BIGINT NOT NULL,   -- epoch millis
//!   deleted_at BIGINT,            -- soft-delete marker, epoch millis
//!   fields LONGTEXT NOT NULL      -- JSON object as text (sqlx Any driver limitation)
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! We use TEXT instead of native JSON type because sqlx's `Any` driver:
//! 1. Doesn't support MySQL's JSON type mapping
//! 2. Treats LONGTEXT/TEXT as BLOB (requires reading as `Vec<u8>` then converting)
//!
//! JSON functions still work on TEXT columns, which is how where-clauses on
//! free-form fields are evaluated:
//!
//! ```sql
//! SELECT COUNT(*) FROM searchable_records
//! WHERE deleted_at IS NULL AND JSON_UNQUOTE(JSON_EXTRACT(fields, '$.category')) = 'hiking';
//! ```

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use tracing::debug;

use super::traits::{RecordSource, RecordView, StorageError, WhereClause};
use crate::batching::BatchWindow;
use crate::config::IndexSyncConfig;
use crate::record::SearchableRecord;
use crate::resilience::retry::{retry, RetryConfig};
use crate::search::{RecordPredicate, SqlDialect, SqlParam, SqlTranslator};

/// Table used when none is given.
pub const DEFAULT_TABLE: &str = "searchable_records";

const COLUMNS: &str = "id, language, title, created_at, deleted_at, fields";

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlRecordSource {
    pool: AnyPool,
    dialect: SqlDialect,
    table: String,
}

impl SqlRecordSource {
    /// Connect with startup-mode retry (fails fast if config is wrong) and
    /// create the default table if missing.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_table(connection_string, DEFAULT_TABLE).await
    }

    /// Connect to `config.sql_url`.
    pub async fn from_config(config: &IndexSyncConfig) -> Result<Self, StorageError> {
        let url = config.sql_url.as_deref().ok_or(StorageError::MissingUrl)?;
        Self::new(url).await
    }

    pub async fn with_table(connection_string: &str, table: &str) -> Result<Self, StorageError> {
        if !SqlTranslator::is_valid_identifier(table) {
            return Err(StorageError::InvalidColumn(table.to_string()));
        }
        install_drivers();

        let dialect = SqlDialect::from_url(connection_string);

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let source = Self {
            pool,
            dialect,
            table: table.to_string(),
        };

        if dialect == SqlDialect::Sqlite {
            source.enable_wal_mode().await?;
        }
        source.init_schema().await?;
        Ok(source)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;
        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let statements = match self.dialect {
            SqlDialect::Sqlite => vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {t} (
                        id INTEGER PRIMARY KEY,
                        language TEXT NOT NULL,
                        title TEXT NOT NULL,
                        created_at INTEGER NOT NULL,
                        deleted_at INTEGER,
                        fields TEXT NOT NULL
                    )",
                    t = self.table
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{t}_language ON {t} (language)",
                    t = self.table
                ),
            ],
            SqlDialect::MySql => vec![format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id BIGINT PRIMARY KEY,
                    language VARCHAR(16) NOT NULL,
                    title VARCHAR(512) NOT NULL,
                    created_at BIGINT NOT NULL,
                    deleted_at BIGINT NULL,
                    fields LONGTEXT NOT NULL,
                    INDEX idx_language (language),
                    INDEX idx_deleted_at (deleted_at)
                )",
                t = self.table
            )],
        };

        for sql in &statements {
            retry("sql_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .await?;
        }
        Ok(())
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: &SearchableRecord) -> Result<(), StorageError> {
        let fields = serde_json::to_string(&record.fields)
            .map_err(|e| StorageError::Decode { id: record.id, reason: e.to_string() })?;
        let sql = format!("REPLACE INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)", self.table);

        sqlx::query(&sql)
            .bind(record.id)
            .bind(record.language.clone())
            .bind(record.title.clone())
            .bind(record.created_at)
            .bind(record.deleted_at)
            .bind(fields)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    pub async fn upsert_many(&self, records: &[SearchableRecord]) -> Result<usize, StorageError> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(records.len())
    }

    /// Set the soft-delete marker. Returns `false` if no such record.
    pub async fn soft_delete(&self, id: i64, deleted_at: i64) -> Result<bool, StorageError> {
        let sql = format!("UPDATE {} SET deleted_at = ? WHERE id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(deleted_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_where(&self, clause: &str, params: &[SqlParam]) -> Result<u64, StorageError> {
        let sql = format!("SELECT COUNT(*) as cnt FROM {} WHERE {}", self.table, clause);

        let row = retry("sql_count", &RetryConfig::query(), || async {
            bind_params(sqlx::query(&sql), params)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_where(
        &self,
        clause: &str,
        params: &[SqlParam],
        order_by: &str,
        skip: u64,
        take: u64,
    ) -> Result<Vec<SearchableRecord>, StorageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            self.table, clause, order_by
        );
        debug!(table = %self.table, skip, take, "Fetching records");

        let rows = retry("sql_fetch", &RetryConfig::query(), || async {
            bind_params(sqlx::query(&sql), params)
                .bind(i64::try_from(take).unwrap_or(i64::MAX))
                .bind(i64::try_from(skip).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        rows.iter().map(decode_row).collect()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &[SqlParam],
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Integer(i) => query.bind(*i),
            SqlParam::Numeric(n) => query.bind(*n),
            SqlParam::Boolean(b) => query.bind(*b),
        };
    }
    query
}

/// Read a TEXT column, falling back to bytes for drivers that report BLOB.
fn text_column(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<String, _>(column)
        .ok()
        .or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

fn decode_row(row: &AnyRow) -> Result<SearchableRecord, StorageError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let decode_err = |reason: &str| StorageError::Decode { id, reason: reason.to_string() };

    let language = text_column(row, "language").ok_or_else(|| decode_err("language is not text"))?;
    let title = text_column(row, "title").ok_or_else(|| decode_err("title is not text"))?;
    let created_at: i64 = row.try_get("created_at").unwrap_or(0);
    let deleted_at: Option<i64> = row.try_get("deleted_at").ok().flatten();

    let fields = match text_column(row, "fields") {
        Some(raw) if !raw.is_empty() => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(decode_err("fields is not a JSON object")),
            Err(e) => return Err(decode_err(&e.to_string())),
        },
        _ => Map::new(),
    };

    Ok(SearchableRecord {
        id,
        deleted_at,
        created_at,
        language,
        title,
        fields,
    })
}

#[async_trait]
impl RecordSource for SqlRecordSource {
    async fn count(&self, view: RecordView, filter: &WhereClause) -> Result<u64, StorageError> {
        let query = SqlTranslator::translate_where(filter, view, self.dialect)?;
        self.count_where(&query.clause, &query.params).await
    }

    async fn fetch_page(
        &self,
        view: RecordView,
        filter: &WhereClause,
        window: BatchWindow,
    ) -> Result<Vec<SearchableRecord>, StorageError> {
        let query = SqlTranslator::translate_where(filter, view, self.dialect)?;
        self.fetch_where(&query.clause, &query.params, &query.order_by, window.skip, window.take)
            .await
    }

    async fn select(
        &self,
        predicate: &RecordPredicate,
        skip: u64,
        take: u64,
    ) -> Result<Vec<SearchableRecord>, StorageError> {
        let query = SqlTranslator::translate(predicate, self.dialect);
        self.fetch_where(&query.clause, &query.params, &query.order_by, skip, take)
            .await
    }

    async fn count_matching(&self, predicate: &RecordPredicate) -> Result<u64, StorageError> {
        let query = SqlTranslator::translate(predicate, self.dialect);
        self.count_where(&query.clause, &query.params).await
    }
}
