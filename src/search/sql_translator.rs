//! SQL Translator
//!
//! Renders routed predicates and sync where-clauses to parameterized SQL
//! for the `records` table. Fixed columns are addressed directly; any other
//! column is looked up in the JSON `fields` column.
//!
//! # SQL Syntax Generated
//!
//! ```sql
//! deleted_at IS NULL AND language = ?                 -- base predicate
//! title LIKE ? ESCAPE '\'                             -- prefix (SQLite)
//! id IN (?, ?, ?)                                     -- index narrowing
//! 1=0                                                 -- index returned nothing
//! JSON_UNQUOTE(JSON_EXTRACT(fields, '$.category')) = ? -- free column (MySQL)
//! json_extract(fields, '$.category') = ?              -- free column (SQLite)
//! ORDER BY CASE id WHEN 30 THEN 0 WHEN 10 THEN 1 ELSE 2 END, id  -- rank order
//! ```

use serde_json::Value;

use crate::storage::{RecordView, StorageError, WhereClause};

use super::predicate::{RecordOrder, RecordPredicate};

/// Columns stored as real table columns.
pub const FIXED_COLUMNS: [&str; 5] = ["id", "language", "title", "created_at", "deleted_at"];

/// JSON column holding the remaining record fields.
pub const FIELDS_COLUMN: &str = "fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySql,
    Sqlite,
}

impl SqlDialect {
    /// Detect the dialect from a connection URL.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Self::Sqlite
        } else {
            Self::MySql
        }
    }
}

/// SQL query translator for the records table
pub struct SqlTranslator;

/// SQL query result with parameterized placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// The WHERE clause (without "WHERE" keyword)
    pub clause: String,
    /// The parameter values in order
    pub params: Vec<SqlParam>,
    /// The ORDER BY list (without "ORDER BY")
    pub order_by: String,
}

/// SQL parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Numeric(f64),
    Boolean(bool),
}

impl SqlTranslator {
    /// Translate a routed predicate to a parameterized WHERE clause and ORDER BY.
    ///
    /// Uses `?` placeholders for parameters.
    pub fn translate(predicate: &RecordPredicate, dialect: SqlDialect) -> SqlQuery {
        let mut params = Vec::new();
        let mut parts = vec!["deleted_at IS NULL".to_string(), "language = ?".to_string()];
        params.push(SqlParam::Text(predicate.language.clone()));

        if let Some(prefix) = &predicate.title_prefix {
            params.push(SqlParam::Text(format!("{prefix}%")));
            parts.push(Self::like("title", dialect));
        }

        if let Some(ids) = &predicate.id_in {
            parts.push(Self::id_in(ids, &mut params));
        }

        SqlQuery {
            clause: parts.join(" AND "),
            params,
            order_by: Self::order_by(predicate),
        }
    }

    /// Translate a sync where-clause over a record view.
    ///
    /// Fails on column names that are not plain identifiers.
    pub fn translate_where(
        filter: &WhereClause,
        view: RecordView,
        dialect: SqlDialect,
    ) -> Result<SqlQuery, StorageError> {
        let mut params = Vec::new();
        let mut parts = vec![match view {
            RecordView::Active => "deleted_at IS NULL".to_string(),
            RecordView::OnlyDeleted => "deleted_at IS NOT NULL".to_string(),
        }];

        for (column, value) in filter.iter() {
            parts.push(Self::equals(column, value, dialect, &mut params)?);
        }

        Ok(SqlQuery {
            clause: parts.join(" AND "),
            params,
            order_by: "id ASC".to_string(),
        })
    }

    /// Plain identifier: ASCII letters, digits and underscores, not starting with a digit.
    #[must_use]
    pub fn is_valid_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn like(column: &str, dialect: SqlDialect) -> String {
        match dialect {
            // Backslash is MySQL's default LIKE escape
            SqlDialect::MySql => format!("{column} LIKE ?"),
            SqlDialect::Sqlite => format!("{column} LIKE ? ESCAPE '\\'"),
        }
    }

    fn id_in(ids: &[i64], params: &mut Vec<SqlParam>) -> String {
        if ids.is_empty() {
            return "1=0".to_string();
        }
        let placeholders: Vec<&str> = ids
            .iter()
            .map(|id| {
                params.push(SqlParam::Integer(*id));
                "?"
            })
            .collect();
        format!("id IN ({})", placeholders.join(", "))
    }

    fn order_by(predicate: &RecordPredicate) -> String {
        match (&predicate.order, &predicate.id_in) {
            (RecordOrder::CreatedAt(direction), _) => format!("created_at {}, id ASC", direction.as_sql()),
            (RecordOrder::Ranked, Some(ids)) if !ids.is_empty() => {
                // Ids are integers, so they are inlined rather than bound
                let mut arms = String::new();
                let mut seen = std::collections::HashSet::new();
                for (rank, id) in ids.iter().enumerate() {
                    if seen.insert(*id) {
                        arms.push_str(&format!(" WHEN {id} THEN {rank}"));
                    }
                }
                format!("CASE id{arms} ELSE {} END, id ASC", ids.len())
            }
            _ => "id ASC".to_string(),
        }
    }

    fn equals(
        column: &str,
        value: &Value,
        dialect: SqlDialect,
        params: &mut Vec<SqlParam>,
    ) -> Result<String, StorageError> {
        if !Self::is_valid_identifier(column) {
            return Err(StorageError::InvalidColumn(column.to_string()));
        }

        let fixed = FIXED_COLUMNS.contains(&column);
        let text_expr = || {
            if fixed {
                column.to_string()
            } else {
                match dialect {
                    SqlDialect::MySql => format!("JSON_UNQUOTE(JSON_EXTRACT({FIELDS_COLUMN}, '$.{column}'))"),
                    SqlDialect::Sqlite => format!("json_extract({FIELDS_COLUMN}, '$.{column}')"),
                }
            }
        };
        let raw_expr = || {
            if fixed {
                column.to_string()
            } else {
                match dialect {
                    SqlDialect::MySql => format!("JSON_EXTRACT({FIELDS_COLUMN}, '$.{column}')"),
                    SqlDialect::Sqlite => format!("json_extract({FIELDS_COLUMN}, '$.{column}')"),
                }
            }
        };

        let clause = match value {
            Value::Null => format!("{} IS NULL", raw_expr()),
            Value::String(s) => {
                params.push(SqlParam::Text(s.clone()));
                format!("{} = ?", text_expr())
            }
            Value::Bool(b) => {
                params.push(SqlParam::Boolean(*b));
                format!("{} = ?", raw_expr())
            }
            Value::Number(n) => {
                match n.as_i64() {
                    Some(i) => params.push(SqlParam::Integer(i)),
                    None => params.push(SqlParam::Numeric(n.as_f64().unwrap_or_default())),
                }
                format!("{} = ?", raw_expr())
            }
            Value::Array(_) | Value::Object(_) => {
                // Compared as serialized JSON text
                params.push(SqlParam::Text(value.to_string()));
                format!("{} = ?", raw_expr())
            }
        };
        Ok(clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::predicate::SortDirection;

    #[test]
    fn test_base_predicate() {
        let sql = SqlTranslator::translate(&RecordPredicate::new("en"), SqlDialect::MySql);
        assert_eq!(sql.clause, "deleted_at IS NULL AND language = ?");
        assert_eq!(sql.params, vec![SqlParam::Text("en".to_string())]);
        assert_eq!(sql.order_by, "id ASC");
    }

    #[test]
    fn test_title_prefix_per_dialect() {
        let predicate = RecordPredicate::new("en").with_title_prefix("a");

        let mysql = SqlTranslator::translate(&predicate, SqlDialect::MySql);
        assert_eq!(mysql.clause, "deleted_at IS NULL AND language = ? AND title LIKE ?");
        assert_eq!(mysql.params[1], SqlParam::Text("a%".to_string()));

        let sqlite = SqlTranslator::translate(&predicate, SqlDialect::Sqlite);
        assert!(sqlite.clause.ends_with("title LIKE ? ESCAPE '\\'"));
    }

    #[test]
    fn test_id_list_and_rank_order() {
        let predicate = RecordPredicate::new("en")
            .with_ids(vec![30, 10])
            .ordered_by(RecordOrder::Ranked);
        let sql = SqlTranslator::translate(&predicate, SqlDialect::MySql);

        assert_eq!(sql.clause, "deleted_at IS NULL AND language = ? AND id IN (?, ?)");
        assert_eq!(
            sql.params,
            vec![SqlParam::Text("en".to_string()), SqlParam::Integer(30), SqlParam::Integer(10)]
        );
        assert_eq!(sql.order_by, "CASE id WHEN 30 THEN 0 WHEN 10 THEN 1 ELSE 2 END, id ASC");
    }

    #[test]
    fn test_empty_id_list_matches_nothing() {
        let predicate = RecordPredicate::new("en").with_ids(vec![]).ordered_by(RecordOrder::Ranked);
        let sql = SqlTranslator::translate(&predicate, SqlDialect::Sqlite);

        assert!(sql.clause.ends_with("AND 1=0"));
        assert_eq!(sql.order_by, "id ASC");
    }

    #[test]
    fn test_created_order() {
        let predicate = RecordPredicate::new("en")
            .with_ids(vec![1])
            .ordered_by(RecordOrder::CreatedAt(SortDirection::Desc));
        let sql = SqlTranslator::translate(&predicate, SqlDialect::MySql);
        assert_eq!(sql.order_by, "created_at DESC, id ASC");
    }

    #[test]
    fn test_where_clause_views() {
        let active = SqlTranslator::translate_where(&WhereClause::new(), RecordView::Active, SqlDialect::MySql).unwrap();
        assert_eq!(active.clause, "deleted_at IS NULL");

        let deleted =
            SqlTranslator::translate_where(&WhereClause::new(), RecordView::OnlyDeleted, SqlDialect::MySql).unwrap();
        assert_eq!(deleted.clause, "deleted_at IS NOT NULL");
    }

    #[test]
    fn test_where_clause_columns() {
        let filter = WhereClause::new().eq("language", "en").eq("category", "hiking").eq("rating", 4);

        let mysql = SqlTranslator::translate_where(&filter, RecordView::Active, SqlDialect::MySql).unwrap();
        assert_eq!(
            mysql.clause,
            "deleted_at IS NULL AND language = ? AND JSON_UNQUOTE(JSON_EXTRACT(fields, '$.category')) = ? \
             AND JSON_EXTRACT(fields, '$.rating') = ?"
        );
        assert_eq!(
            mysql.params,
            vec![
                SqlParam::Text("en".to_string()),
                SqlParam::Text("hiking".to_string()),
                SqlParam::Integer(4)
            ]
        );

        let sqlite = SqlTranslator::translate_where(&filter, RecordView::Active, SqlDialect::Sqlite).unwrap();
        assert!(sqlite.clause.contains("json_extract(fields, '$.category') = ?"));
    }

    #[test]
    fn test_where_clause_null() {
        let filter = WhereClause::new().eq("region", Value::Null);
        let sql = SqlTranslator::translate_where(&filter, RecordView::Active, SqlDialect::Sqlite).unwrap();
        assert_eq!(sql.clause, "deleted_at IS NULL AND json_extract(fields, '$.region') IS NULL");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_invalid_column_rejected() {
        let filter = WhereClause::new().eq("x'); DROP TABLE records; --", 1);
        let err = SqlTranslator::translate_where(&filter, RecordView::Active, SqlDialect::MySql).unwrap_err();
        assert!(matches!(err, StorageError::InvalidColumn(_)));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(SqlTranslator::is_valid_identifier("category"));
        assert!(SqlTranslator::is_valid_identifier("_x1"));
        assert!(!SqlTranslator::is_valid_identifier("1x"));
        assert!(!SqlTranslator::is_valid_identifier(""));
        assert!(!SqlTranslator::is_valid_identifier("a.b"));
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(SqlDialect::from_url("sqlite::memory:"), SqlDialect::Sqlite);
        assert_eq!(SqlDialect::from_url("mysql://u:p@h/db"), SqlDialect::MySql);
    }
}
