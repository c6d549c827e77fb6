// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Caller-supplied search filters and allow-list validation.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A filter value: one term, or several OR-ed together.
///
/// Numbers and booleans deserialize into their string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "RawFilterValue")]
pub enum FilterValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTerm {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl From<RawTerm> for String {
    fn from(term: RawTerm) -> Self {
        match term {
            RawTerm::Text(value) => value,
            RawTerm::Int(value) => value.to_string(),
            RawTerm::UInt(value) => value.to_string(),
            RawTerm::Float(value) => value.to_string(),
            RawTerm::Bool(value) => value.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFilterValue {
    One(RawTerm),
    Many(Vec<RawTerm>),
}

impl From<RawFilterValue> for FilterValue {
    fn from(raw: RawFilterValue) -> Self {
        match raw {
            RawFilterValue::One(term) => Self::Scalar(term.into()),
            RawFilterValue::Many(terms) => Self::List(terms.into_iter().map(Into::into).collect()),
        }
    }
}

impl FilterValue {
    /// Empty strings and empty lists carry no constraint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_empty(),
            Self::List(values) => values.is_empty(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl<S: Into<String>> From<Vec<S>> for FilterValue {
    fn from(values: Vec<S>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Filters in declaration order.
///
/// Order matters: the query translator emits clauses in the order the
/// filters were added. Serializes as a JSON object whose key order is kept
/// on the way back in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters(Vec<(String, FilterValue)>);

impl SearchFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter; a repeated key replaces the earlier value in place.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only allow-listed keys with a non-empty value.
    #[must_use]
    pub fn validate<S: AsRef<str>>(&self, allowed: &[S]) -> ValidatedFilters {
        let filters: Vec<(String, FilterValue)> = self
            .0
            .iter()
            .filter(|(key, value)| !value.is_empty() && allowed.iter().any(|a| a.as_ref() == key))
            .cloned()
            .collect();

        ValidatedFilters {
            is_valid: !filters.is_empty(),
            filters: SearchFilters(filters),
        }
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for SearchFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (key, value) in iter {
            filters.insert(key, value);
        }
        filters
    }
}

impl Serialize for SearchFilters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct SearchFiltersVisitor;

impl<'de> Visitor<'de> for SearchFiltersVisitor {
    type Value = SearchFilters;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of filter keys to a term or a list of terms")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut filters = SearchFilters::new();
        while let Some((key, value)) = access.next_entry::<String, FilterValue>()? {
            filters.insert(key, value);
        }
        Ok(filters)
    }
}

impl<'de> Deserialize<'de> for SearchFilters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SearchFiltersVisitor)
    }
}

/// Filters that passed the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedFilters {
    /// At least one allowed key had a non-empty value
    pub is_valid: bool,
    pub filters: SearchFilters,
}
