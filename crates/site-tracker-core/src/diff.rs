//! Snapshot diff and persistence gate.
//!
//! Joins the previous snapshot against the current one on `(site, date)` and
//! classifies every joined cell:
//!
//! | Predicate | Rule |
//! |-----------|------|
//! | newly available | `prev != Available && curr == Available` |
//! | newly booked | `prev != Booked && curr == Booked` |
//! | unchanged | `prev == curr` |
//!
//! The predicates are evaluated independently. Since the three
//! [`Availability`] states are disjoint, a row is never both newly
//! available and newly booked.
//!
//! A current cell with no previous counterpart is handled according to the
//! [`MissingPrevious`] policy. Cells present only in the previous snapshot
//! are never reported.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Availability, Snapshot};

/// How to treat a current cell that has no row in the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPrevious {
    /// Outer join: the missing previous value reads as [`Availability::Unknown`].
    #[default]
    Unknown,
    /// Inner join: the cell is left out of the report.
    Exclude,
}

/// One joined `(site, date)` cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    pub site: String,
    pub date: NaiveDate,
    /// `None` when the previous snapshot had no such cell.
    pub prev: Option<Availability>,
    pub curr: Availability,
}

impl MergedRow {
    /// Previous availability with a missing row read as `Unknown`.
    pub fn prev_or_unknown(&self) -> Availability {
        self.prev.unwrap_or(Availability::Unknown)
    }

    pub fn is_newly_available(&self) -> bool {
        self.prev_or_unknown() != Availability::Available && self.curr == Availability::Available
    }

    pub fn is_newly_booked(&self) -> bool {
        self.prev_or_unknown() != Availability::Booked && self.curr == Availability::Booked
    }

    pub fn is_unchanged(&self) -> bool {
        self.prev_or_unknown() == self.curr
    }
}

/// Result of [`diff`]: the joined rows plus whether a previous snapshot
/// existed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    /// Joined rows, in current-snapshot order. Consumers sort as needed.
    pub rows: Vec<MergedRow>,
    pub previous_exists: bool,
}

impl DiffReport {
    pub fn newly_available(&self) -> impl Iterator<Item = &MergedRow> {
        self.rows.iter().filter(|r| r.is_newly_available())
    }

    pub fn newly_booked(&self) -> impl Iterator<Item = &MergedRow> {
        self.rows.iter().filter(|r| r.is_newly_booked())
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &MergedRow> {
        self.rows.iter().filter(|r| r.is_unchanged())
    }

    pub fn has_newly_available(&self) -> bool {
        self.newly_available().next().is_some()
    }

    pub fn has_newly_booked(&self) -> bool {
        self.newly_booked().next().is_some()
    }

    /// Whether the summary email should go out.
    pub fn should_notify(&self) -> bool {
        self.has_newly_available()
    }

    /// Persistence gate for the current snapshot.
    pub fn persist_decision(&self) -> PersistDecision {
        if !self.previous_exists {
            return PersistDecision::FirstSnapshot;
        }
        let newly_available = self.newly_available().count();
        let newly_booked = self.newly_booked().count();
        if newly_available > 0 || newly_booked > 0 {
            PersistDecision::Changed {
                newly_available,
                newly_booked,
            }
        } else {
            PersistDecision::Unchanged
        }
    }
}

/// Outcome of the persistence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistDecision {
    /// No previous snapshot exists; always written.
    FirstSnapshot,
    /// At least one cell became available or booked.
    Changed {
        newly_available: usize,
        newly_booked: usize,
    },
    /// Nothing moved; the write is skipped.
    Unchanged,
}

impl PersistDecision {
    pub fn should_write(self) -> bool {
        !matches!(self, PersistDecision::Unchanged)
    }
}

/// Join `previous` against `current` on `(site, date)`.
///
/// `previous` is `None` when the warehouse holds no snapshot yet.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot, policy: MissingPrevious) -> DiffReport {
    let prev_index: HashMap<(&str, NaiveDate), Availability> = previous
        .map(|snap| {
            snap.records
                .iter()
                .map(|r| ((r.site.as_str(), r.date), r.availability))
                .collect()
        })
        .unwrap_or_default();

    let rows = current
        .records
        .iter()
        .filter_map(|r| {
            let prev = prev_index.get(&(r.site.as_str(), r.date)).copied();
            if prev.is_none() && policy == MissingPrevious::Exclude {
                return None;
            }
            Some(MergedRow {
                site: r.site.clone(),
                date: r.date,
                prev,
                curr: r.availability,
            })
        })
        .collect();

    DiffReport {
        rows,
        previous_exists: previous.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AvailabilityRecord;
    use chrono::Utc;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn snap(cells: &[(&str, &str, Availability)]) -> Snapshot {
        Snapshot::new(
            Utc::now(),
            cells
                .iter()
                .map(|(site, date, a)| AvailabilityRecord::new(*site, d(date), *a))
                .collect(),
        )
    }

    const ALL: [Availability; 3] = [
        Availability::Available,
        Availability::Booked,
        Availability::Unknown,
    ];

    #[test]
    fn test_booked_to_available() {
        let prev = snap(&[("A", "2021-01-01", Availability::Booked)]);
        let curr = snap(&[("A", "2021-01-01", Availability::Available)]);
        let report = diff(Some(&prev), &curr, MissingPrevious::Unknown);

        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].is_newly_available());
        assert!(!report.rows[0].is_newly_booked());
        assert!(report.should_notify());
        assert_eq!(
            report.persist_decision(),
            PersistDecision::Changed {
                newly_available: 1,
                newly_booked: 0
            }
        );
    }

    #[test]
    fn test_at_most_one_transition_per_row() {
        for prev in ALL {
            for curr in ALL {
                let row = MergedRow {
                    site: "A".into(),
                    date: d("2021-01-01"),
                    prev: Some(prev),
                    curr,
                };
                assert!(
                    !(row.is_newly_available() && row.is_newly_booked()),
                    "{:?} -> {:?}",
                    prev,
                    curr
                );
                assert_eq!(row.is_unchanged(), prev == curr);
            }
        }
    }

    #[test]
    fn test_identical_snapshots_unchanged() {
        let cells = [
            ("A", "2021-01-01", Availability::Available),
            ("A", "2021-01-02", Availability::Booked),
            ("B", "2021-01-01", Availability::Unknown),
        ];
        let report = diff(Some(&snap(&cells)), &snap(&cells), MissingPrevious::Unknown);

        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.is_unchanged()));
        assert!(!report.should_notify());
        assert_eq!(report.persist_decision(), PersistDecision::Unchanged);
        assert!(!report.persist_decision().should_write());
    }

    #[test]
    fn test_missing_previous_row_reads_as_unknown() {
        let prev = snap(&[("A", "2021-01-01", Availability::Booked)]);
        let curr = snap(&[
            ("A", "2021-01-01", Availability::Booked),
            ("B", "2021-01-01", Availability::Available),
        ]);
        let report = diff(Some(&prev), &curr, MissingPrevious::Unknown);

        let newly: Vec<_> = report.newly_available().collect();
        assert_eq!(newly.len(), 1);
        assert_eq!(newly[0].site, "B");
        assert_eq!(newly[0].prev, None);
    }

    #[test]
    fn test_missing_previous_row_excluded() {
        let prev = snap(&[("A", "2021-01-01", Availability::Booked)]);
        let curr = snap(&[
            ("A", "2021-01-01", Availability::Booked),
            ("B", "2021-01-01", Availability::Available),
        ]);
        let report = diff(Some(&prev), &curr, MissingPrevious::Exclude);

        assert_eq!(report.rows.len(), 1);
        assert!(!report.should_notify());
        assert_eq!(report.persist_decision(), PersistDecision::Unchanged);
    }

    #[test]
    fn test_first_snapshot_always_persists() {
        let curr = snap(&[("A", "2021-01-01", Availability::Unknown)]);
        let report = diff(None, &curr, MissingPrevious::Unknown);

        assert!(!report.previous_exists);
        assert!(report.rows[0].is_unchanged());
        assert_eq!(report.persist_decision(), PersistDecision::FirstSnapshot);
        assert!(report.persist_decision().should_write());
    }

    #[test]
    fn test_available_to_booked_persists_without_notifying() {
        let prev = snap(&[("A", "2021-01-01", Availability::Available)]);
        let curr = snap(&[("A", "2021-01-01", Availability::Booked)]);
        let report = diff(Some(&prev), &curr, MissingPrevious::Unknown);

        assert!(report.has_newly_booked());
        assert!(!report.should_notify());
        assert!(report.persist_decision().should_write());
    }

    #[test]
    fn test_previous_only_rows_not_reported() {
        let prev = snap(&[
            ("A", "2021-01-01", Availability::Available),
            ("A", "2020-12-31", Availability::Available),
        ]);
        let curr = snap(&[("A", "2021-01-01", Availability::Available)]);
        let report = diff(Some(&prev), &curr, MissingPrevious::Unknown);

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].date, d("2021-01-01"));
    }
}
