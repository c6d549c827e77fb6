// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offset batching over a record count.

pub mod planner;

pub use planner::{plan, BatchPlanner, BatchWindow, PlanError, DEFAULT_BATCH_SIZE};
