//! Storage abstraction for availability snapshots.
//!
//! The [`Warehouse`] trait is the only interface the pipeline uses to read
//! the previous snapshot and append the current one, enabling pluggable
//! backends (SQLite in the binary, in-memory for tests).
//!
//! Storage is append-only: snapshots are never updated or deleted.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Snapshot;

/// Per-snapshot totals shown by `site-tracker history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub run_id: String,
    pub captured_at: DateTime<Utc>,
    pub rows: usize,
    pub available: usize,
}

/// Abstract snapshot store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`latest_snapshot`](Warehouse::latest_snapshot) | Snapshot with the max capture time |
/// | [`append_snapshot`](Warehouse::append_snapshot) | Append every row of a snapshot |
/// | [`list_snapshots`](Warehouse::list_snapshots) | Newest-first summaries |
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Most recently captured snapshot, or `None` if nothing was ever stored.
    async fn latest_snapshot(&self) -> Result<Option<Snapshot>>;

    /// Append a full snapshot. Returns the number of rows written.
    ///
    /// An empty snapshot stores nothing and never becomes the latest.
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<usize>;

    /// Summaries of stored snapshots, newest first, at most `limit`.
    async fn list_snapshots(&self, limit: usize) -> Result<Vec<SnapshotSummary>>;
}
