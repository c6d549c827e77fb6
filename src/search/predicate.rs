// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational predicates produced by the result router.
//!
//! A [`RecordPredicate`] is a small, backend-neutral description of the
//! relational query a search resolves to. The SQL translator renders it to
//! a WHERE/ORDER BY pair; the in-memory record source evaluates it directly.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::SearchableRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The caller's sort preference for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortRequest {
    /// `created_data_asc`
    CreatedAsc,
    /// `created_data_desc`
    CreatedDesc,
    /// Anything else: keep the index's relevance order
    #[default]
    Relevance,
}

impl SortRequest {
    /// Parse the `sort_by` request value. Unknown values mean relevance.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    /// The creation-time direction, if this request asks for one.
    #[must_use]
    pub fn created_direction(&self) -> Option<SortDirection> {
        match self {
            Self::CreatedAsc => Some(SortDirection::Asc),
            Self::CreatedDesc => Some(SortDirection::Desc),
            Self::Relevance => None,
        }
    }
}

impl FromStr for SortRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_data_asc" => Ok(Self::CreatedAsc),
            "created_data_desc" => Ok(Self::CreatedDesc),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

/// How matching records are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    /// Backend default (ascending id)
    #[default]
    Unspecified,
    /// By creation timestamp
    CreatedAt(SortDirection),
    /// By position in the predicate's id list
    Ranked,
}

/// Relational filter plus ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPredicate {
    /// `language = ?`
    pub language: String,
    /// `title LIKE '<prefix>%'`; the prefix is already backslash-escaped
    pub title_prefix: Option<String>,
    /// `id IN (...)`, in index rank order
    pub id_in: Option<Vec<i64>>,
    pub order: RecordOrder,
}

impl RecordPredicate {
    /// Base predicate: records in `language`.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            title_prefix: None,
            id_in: None,
            order: RecordOrder::Unspecified,
        }
    }

    #[must_use]
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Vec<i64>) -> Self {
        self.id_in = Some(ids);
        self
    }

    #[must_use]
    pub fn ordered_by(mut self, order: RecordOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether the index narrowed this predicate.
    #[must_use]
    pub fn is_index_narrowed(&self) -> bool {
        self.id_in.is_some()
    }

    /// Evaluate against one record. Soft-deleted records never match.
    #[must_use]
    pub fn matches(&self, record: &SearchableRecord) -> bool {
        if record.is_deleted() || record.language != self.language {
            return false;
        }
        if let Some(prefix) = &self.title_prefix {
            let prefix = unescape(prefix).to_lowercase();
            if !record.title.to_lowercase().starts_with(&prefix) {
                return false;
            }
        }
        match &self.id_in {
            Some(ids) => ids.contains(&record.id),
            None => true,
        }
    }

    /// Sort records in place according to [`RecordOrder`].
    ///
    /// Ties (and ids missing from the rank list) fall back to ascending id.
    pub fn sort(&self, records: &mut [SearchableRecord]) {
        match self.order {
            RecordOrder::Unspecified => records.sort_by_key(|r| r.id),
            RecordOrder::CreatedAt(direction) => records.sort_by(|a, b| {
                let by_time = match direction {
                    SortDirection::Asc => a.created_at.cmp(&b.created_at),
                    SortDirection::Desc => b.created_at.cmp(&a.created_at),
                };
                by_time.then(a.id.cmp(&b.id))
            }),
            RecordOrder::Ranked => {
                // First occurrence wins when the index returns an id twice
                let mut rank: HashMap<i64, usize> = HashMap::new();
                for (pos, id) in self.id_in.iter().flatten().enumerate() {
                    rank.entry(*id).or_insert(pos);
                }
                records.sort_by(|a, b| match (rank.get(&a.id), rank.get(&b.id)) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => a.id.cmp(&b.id),
                });
            }
        }
    }

    /// Filter and order a record set.
    #[must_use]
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a SearchableRecord>) -> Vec<SearchableRecord> {
        let mut matched: Vec<SearchableRecord> = records.into_iter().filter(|r| self.matches(r)).cloned().collect();
        self.sort(&mut matched);
        matched
    }
}

/// Drop the escaping backslashes added by keyword sanitization.
fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
