//! Notification content, independent of how it is rendered.
//!
//! A digest lists, per site, every date that is currently available and
//! still upcoming, flagging the ones that just opened up. Dates come from
//! the *current* snapshot, not only from the newly-available delta.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::diff::DiffReport;
use crate::models::{Availability, Site, Snapshot};

/// One listed date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestDate {
    pub date: NaiveDate,
    /// Whether this date became available in this run.
    pub newly_available: bool,
}

/// One site section of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDigest {
    pub site_id: String,
    pub display_name: String,
    /// Ascending, strictly after the send date.
    pub dates: Vec<DigestDate>,
}

impl SiteDigest {
    pub fn newly_available_count(&self) -> usize {
        self.dates.iter().filter(|d| d.newly_available).count()
    }
}

/// Build the per-site sections for the summary email.
///
/// Sections follow the order of `sites`; a site with no upcoming available
/// date is omitted. Snapshot sites missing from `sites` are listed after the
/// configured ones under their raw id.
pub fn build_digest(
    sites: &[Site],
    current: &Snapshot,
    report: &DiffReport,
    today: NaiveDate,
) -> Vec<SiteDigest> {
    let newly: HashSet<(&str, NaiveDate)> = report
        .newly_available()
        .map(|r| (r.site.as_str(), r.date))
        .collect();

    let mut by_site: BTreeMap<&str, Vec<DigestDate>> = BTreeMap::new();
    for rec in &current.records {
        if rec.availability != Availability::Available || rec.date <= today {
            continue;
        }
        by_site.entry(rec.site.as_str()).or_default().push(DigestDate {
            date: rec.date,
            newly_available: newly.contains(&(rec.site.as_str(), rec.date)),
        });
    }

    let mut digest = Vec::new();
    for site in sites {
        if let Some(dates) = by_site.remove(site.id.as_str()) {
            digest.push(section(&site.id, &site.display_name, dates));
        }
    }
    for (site_id, dates) in by_site {
        digest.push(section(site_id, site_id, dates));
    }
    digest
}

fn section(site_id: &str, display_name: &str, mut dates: Vec<DigestDate>) -> SiteDigest {
    dates.sort_by_key(|d| d.date);
    dates.dedup_by_key(|d| d.date);
    SiteDigest {
        site_id: site_id.to_string(),
        display_name: display_name.to_string(),
        dates,
    }
}
