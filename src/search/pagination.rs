// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

/// A page of results plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// `last_page = ceil(total / per_page)`, or 0 when `per_page` is 0.
///
/// ```
/// use index_sync::search::prepare_meta_data;
///
/// let meta = prepare_meta_data(25, 1, 10);
/// assert_eq!(meta.last_page, 3);
/// ```
#[must_use]
pub fn prepare_meta_data(total: u64, page: u64, per_page: u64) -> PageMeta {
    let last_page = if per_page == 0 { 0 } else { total.div_ceil(per_page) };
    PageMeta {
        current_page: page,
        per_page,
        total,
        last_page,
    }
}
