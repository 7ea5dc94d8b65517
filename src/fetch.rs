//! Availability fetcher.
//!
//! Requests the configured window for one site from the remote booking API
//! and turns the response into one [`AvailabilityRecord`] per date.
//!
//! The API answers with a bare JSON array and no per-element date, so the
//! i-th element is assigned the i-th day of the window by position. Before
//! decoding, every literal `null` token in the body is rewritten to the
//! [`UNKNOWN_SENTINEL`] placeholder.
//!
//! Network failures, non-2xx statuses and malformed JSON are returned as
//! errors. There is no retry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use site_tracker_core::models::{
    Availability, AvailabilityRecord, AvailabilityWindow, Site, Snapshot, UNKNOWN_SENTINEL,
};
use std::time::Duration;

use crate::config::ApiConfig;

/// A source of per-date availability for a single site.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// One record per window date, in window order.
    async fn fetch(
        &self,
        site: &Site,
        window: &AvailabilityWindow,
    ) -> Result<Vec<AvailabilityRecord>>;
}

/// [`AvailabilitySource`] backed by the remote booking API.
pub struct HttpAvailabilitySource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpAvailabilitySource {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("site-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url_template: config.url_template.clone(),
        })
    }
}

#[async_trait]
impl AvailabilitySource for HttpAvailabilitySource {
    async fn fetch(
        &self,
        site: &Site,
        window: &AvailabilityWindow,
    ) -> Result<Vec<AvailabilityRecord>> {
        let url = site_url(&self.url_template, &site.id, window);
        tracing::debug!(site = %site.id, %url, "requesting availability");

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_availability(&body, &site.id, window)
    }
}

/// Substitute the site id and ISO window bounds into the URL template.
pub fn site_url(template: &str, site_id: &str, window: &AvailabilityWindow) -> String {
    template
        .replace("{site}", site_id)
        .replace("{start}", &window.start().format("%Y-%m-%d").to_string())
        .replace("{end}", &window.end().format("%Y-%m-%d").to_string())
}

#[derive(Debug, Deserialize)]
struct RawDay {
    availability: i64,
}

/// Decode an API response body into records for `site_id`.
pub fn parse_availability(
    body: &str,
    site_id: &str,
    window: &AvailabilityWindow,
) -> Result<Vec<AvailabilityRecord>> {
    let normalized = body.replace("null", &UNKNOWN_SENTINEL.to_string());
    let days: Vec<RawDay> = serde_json::from_str(&normalized)
        .with_context(|| format!("malformed availability response for site {}", site_id))?;

    if days.len() != window.len() {
        tracing::warn!(
            site = site_id,
            returned = days.len(),
            expected = window.len(),
            "availability response length does not match the window"
        );
    }

    let records = window
        .days()
        .zip(days)
        .map(|(date, day)| {
            let availability = Availability::from_code(day.availability).unwrap_or_else(|| {
                tracing::warn!(
                    site = site_id,
                    %date,
                    code = day.availability,
                    "unrecognised availability code, treating as unknown"
                );
                Availability::Unknown
            });
            AvailabilityRecord::new(site_id, date, availability)
        })
        .collect();

    Ok(records)
}

/// Fetch every site in order and assemble the current snapshot.
pub async fn fetch_snapshot(
    source: &dyn AvailabilitySource,
    sites: &[Site],
    window: &AvailabilityWindow,
    captured_at: DateTime<Utc>,
) -> Result<Snapshot> {
    let mut records = Vec::with_capacity(sites.len() * window.len());
    for site in sites {
        let fetched = source
            .fetch(site, window)
            .await
            .with_context(|| format!("fetching availability for site {} ({})", site.id, site.display_name))?;
        tracing::info!(
            site = %site.id,
            days = fetched.len(),
            available = fetched
                .iter()
                .filter(|r| r.availability == Availability::Available)
                .count(),
            "fetched availability"
        );
        records.extend(fetched);
    }
    Ok(Snapshot::new(captured_at, records))
}
