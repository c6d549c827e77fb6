// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch planning for offset-paged sync.
//!
//! The [`BatchPlanner`] splits a record count into contiguous
//! `skip`/`take` windows. It always emits one trailing window past the last
//! full one, so a planner never has to know the remainder:
//!
//! ```text
//! count = 250, size = 100
//!
//!   [0, 100)  [100, 200)  [200, 300)
//!    full       full       trailing (yields 50)
//!
//! count = 200, size = 100
//!
//!   [0, 100)  [100, 200)  [200, 300)
//!    full       full       trailing (yields 0)
//! ```
//!
//! # Example
//!
//! ```
//! use index_sync::batching::{BatchPlanner, BatchWindow};
//!
//! let planner = BatchPlanner::new(100).unwrap();
//! let windows = planner.plan(250);
//!
//! assert_eq!(windows.len(), 3);
//! assert_eq!(windows[2], BatchWindow { skip: 200, take: 100 });
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size used when none is configured.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("batch size must be positive")]
    ZeroBatchSize,
}

/// A contiguous offset range over an ordered sequence.
///
/// `take` is an upper bound: the source may return fewer rows, or none,
/// when it is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    pub skip: u64,
    pub take: u64,
}

impl BatchWindow {
    /// Exclusive upper offset of the window.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.skip.saturating_add(self.take)
    }
}

impl std::fmt::Display for BatchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.skip, self.end())
    }
}

/// Computes offset windows for a given page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    size: u64,
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchPlanner {
    pub fn new(size: u64) -> Result<Self, PlanError> {
        if size == 0 {
            return Err(PlanError::ZeroBatchSize);
        }
        Ok(Self { size })
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Plan `count / size` full windows plus one trailing window.
    #[must_use]
    pub fn plan(&self, count: u64) -> Vec<BatchWindow> {
        let iterations = count / self.size;
        let mut windows = Vec::with_capacity(iterations as usize + 1);

        for i in 0..iterations {
            windows.push(BatchWindow {
                skip: i * self.size,
                take: self.size,
            });
        }

        windows.push(BatchWindow {
            skip: iterations * self.size,
            take: self.size,
        });

        windows
    }
}

/// Shorthand for `BatchPlanner::new(size)?.plan(count)`.
pub fn plan(count: u64, size: u64) -> Result<Vec<BatchWindow>, PlanError> {
    Ok(BatchPlanner::new(size)?.plan(count))
}
