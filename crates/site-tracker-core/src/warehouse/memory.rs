//! In-memory [`Warehouse`] implementation for tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::Snapshot;

use super::{SnapshotSummary, Warehouse};

/// In-memory snapshot store.
pub struct InMemoryWarehouse {
    snapshots: RwLock<Vec<Snapshot>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(Vec::new()),
        }
    }

    /// Start with `snapshot` already stored.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshots: RwLock::new(vec![snapshot]),
        }
    }

    /// Copy of everything stored so far, in append order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| anyhow!("warehouse lock poisoned"))?;
        // max_by_key keeps the last maximum, so ties go to the later append.
        Ok(snapshots
            .iter()
            .max_by_key(|s| s.captured_at)
            .cloned())
    }

    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<usize> {
        if snapshot.is_empty() {
            return Ok(0);
        }
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| anyhow!("warehouse lock poisoned"))?;
        snapshots.push(snapshot.clone());
        Ok(snapshot.len())
    }

    async fn list_snapshots(&self, limit: usize) -> Result<Vec<SnapshotSummary>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| anyhow!("warehouse lock poisoned"))?;
        let mut summaries: Vec<SnapshotSummary> = snapshots
            .iter()
            .map(|s| SnapshotSummary {
                run_id: s.run_id.clone(),
                captured_at: s.captured_at,
                rows: s.len(),
                available: s.available_count(),
            })
            .collect();
        summaries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, AvailabilityRecord};
    use chrono::{Duration, NaiveDate, Utc};

    fn snap_at(offset_secs: i64, availability: Availability) -> Snapshot {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        Snapshot::new(
            Utc::now() + Duration::seconds(offset_secs),
            vec![AvailabilityRecord::new("A", date, availability)],
        )
    }

    #[tokio::test]
    async fn test_empty_has_no_latest() {
        let wh = InMemoryWarehouse::new();
        assert!(wh.latest_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_is_max_captured_at() {
        let wh = InMemoryWarehouse::new();
        let newer = snap_at(60, Availability::Available);
        let older = snap_at(0, Availability::Booked);
        wh.append_snapshot(&newer).await.unwrap();
        wh.append_snapshot(&older).await.unwrap();

        let latest = wh.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.run_id, newer.run_id);
    }

    #[tokio::test]
    async fn test_empty_snapshot_not_stored() {
        let wh = InMemoryWarehouse::new();
        let empty = Snapshot::new(Utc::now(), vec![]);
        assert_eq!(wh.append_snapshot(&empty).await.unwrap(), 0);
        assert!(wh.latest_snapshot().await.unwrap().is_none());
        assert!(wh.list_snapshots(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let wh = InMemoryWarehouse::new();
        for i in 0..3 {
            wh.append_snapshot(&snap_at(i * 10, Availability::Available))
                .await
                .unwrap();
        }
        let list = wh.list_snapshots(2).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].captured_at > list[1].captured_at);
        assert_eq!(list[0].available, 1);
    }
}
