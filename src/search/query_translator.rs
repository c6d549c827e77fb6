// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Translator
//!
//! Builds the index query string from a keyword, filters and a raw query.
//!
//! # Query Shape
//!
//! ```text
//! title:"kw" AND body:"kw"^20                   - keyword over every search field,
//!                                                 last field boosted
//!  AND category:hiking                           - scalar filter
//!  AND tags:(alpine OR lakes)                    - list filter
//! (<everything above>) AND <raw>                 - raw query appended
//! ```
//!
//! Clause text, spacing included, matches what the index has always been
//! sent so relevance stays comparable across deployments.

use crate::client::QueryString;

use super::filters::{FilterValue, SearchFilters};

/// Characters that carry meaning in the index query syntax.
pub const ESCAPED_CHARS: [char; 10] = ['%', '_', '\\', '[', ']', '^', '$', '*', '(', ')'];

/// Default boost on the last keyword clause.
pub const DEFAULT_BOOST: u32 = 20;

/// Prefix each of `% _ \ [ ] ^ $ * ( )` with a backslash.
///
/// ```
/// use index_sync::search::sanitize_keyword;
///
/// assert_eq!(sanitize_keyword("50% (off)"), r"50\% \(off\)");
/// ```
#[must_use]
pub fn sanitize_keyword(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if ESCAPED_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Translates search requests for one collection's search fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTranslator {
    search_fields: Vec<String>,
    boost: u32,
}

impl QueryTranslator {
    pub fn new<S: Into<String>>(search_fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            search_fields: search_fields.into_iter().map(Into::into).collect(),
            boost: DEFAULT_BOOST,
        }
    }

    #[must_use]
    pub fn with_boost(mut self, boost: u32) -> Self {
        self.boost = boost;
        self
    }

    #[must_use]
    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    /// Build the query string.
    ///
    /// The keyword is inserted as given; callers sanitize it first. Empty
    /// keywords, empty filter values and empty raw queries are ignored.
    #[must_use]
    pub fn build(&self, keyword: Option<&str>, filters: &SearchFilters, additional_query: Option<&str>) -> QueryString {
        let mut query = String::new();

        let keyword = keyword.filter(|k| !k.is_empty());
        if let Some(keyword) = keyword {
            let last = self.search_fields.len().saturating_sub(1);
            for (i, field) in self.search_fields.iter().enumerate() {
                if i < last {
                    query.push_str(&format!("{field}:\"{keyword}\" AND "));
                } else {
                    query.push_str(&format!("{field}:\"{keyword}\"^{} ", self.boost));
                }
            }
        }
        let keyword_clause = !query.is_empty();

        let mut emitted = 0usize;
        for (key, value) in filters.iter() {
            if value.is_empty() {
                continue;
            }
            if emitted > 0 || keyword_clause {
                query.push_str(" AND ");
            }
            match value {
                FilterValue::List(values) => query.push_str(&format!("{key}:({}) ", values.join(" OR "))),
                FilterValue::Scalar(value) => query.push_str(&format!("{key}:{value}")),
            }
            emitted += 1;
        }

        if let Some(raw) = additional_query.filter(|raw| !raw.is_empty()) {
            query = if query.is_empty() {
                raw.to_string()
            } else {
                format!("({query}) AND {raw}")
            };
        }

        QueryString::new(query)
    }
}
