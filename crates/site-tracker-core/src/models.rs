//! Core data models used throughout Site Tracker.
//!
//! These types represent the sites, availability cells, and snapshots that
//! flow through the fetch → diff → persist → notify pipeline.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Numeric placeholder the upstream API's `null` is rewritten to before
/// decoding. Also the code [`Availability::Unknown`] is stored under.
pub const UNKNOWN_SENTINEL: i64 = -99;

/// State of a single `(site, date)` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Bookable (upstream code `0`).
    Available,
    /// Taken (upstream code `1`).
    Booked,
    /// Upstream returned `null`.
    Unknown,
}

impl Availability {
    /// Decode an upstream/warehouse code. Returns `None` for codes outside
    /// the known set so callers can decide how loudly to complain.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Availability::Available),
            1 => Some(Availability::Booked),
            UNKNOWN_SENTINEL => Some(Availability::Unknown),
            _ => None,
        }
    }

    /// Numeric code used on the wire and in the warehouse.
    pub fn code(self) -> i64 {
        match self {
            Availability::Available => 0,
            Availability::Booked => 1,
            Availability::Unknown => UNKNOWN_SENTINEL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Booked => "booked",
            Availability::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trackable location. Loaded once per run from the sites file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    /// Opaque identifier substituted into the API URL.
    pub id: String,
    /// Human-readable name used in emails and CLI output.
    pub display_name: String,
}

impl Site {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One `(site, date)` cell as captured by a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityRecord {
    pub site: String,
    pub date: NaiveDate,
    pub availability: Availability,
}

impl AvailabilityRecord {
    pub fn new(site: impl Into<String>, date: NaiveDate, availability: Availability) -> Self {
        Self {
            site: site.into(),
            date,
            availability,
        }
    }
}

/// Every record captured in one run, tagged with its capture time.
///
/// Within a snapshot `(site, date)` is unique. Snapshots are persisted
/// append-only and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// UUID identifying the run that captured this snapshot.
    pub run_id: String,
    pub captured_at: DateTime<Utc>,
    pub records: Vec<AvailabilityRecord>,
}

impl Snapshot {
    /// Start a fresh snapshot captured at `captured_at` with a new run id.
    pub fn new(captured_at: DateTime<Utc>, records: Vec<AvailabilityRecord>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            captured_at,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of cells currently [`Availability::Available`].
    pub fn available_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.availability == Availability::Available)
            .count()
    }
}

/// The fixed `[start, end)` range of dates queried per run.
///
/// Deserializes from `{ start = "YYYY-MM-DD", end = "YYYY-MM-DD" }` and
/// rejects an empty or inverted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct AvailabilityWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl AvailabilityWindow {
    /// Build a window. `end` is exclusive and must be after `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            bail!("window end ({}) must be after start ({})", end, start);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the window.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every date in the window, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

/// Unvalidated window bounds as written in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TryFrom<WindowBounds> for AvailabilityWindow {
    type Error = anyhow::Error;

    fn try_from(bounds: WindowBounds) -> Result<Self> {
        Self::new(bounds.start, bounds.end)
    }
}

impl fmt::Display for AvailabilityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
