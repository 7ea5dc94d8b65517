//! `site-tracker sites` and `site-tracker check`.

use anyhow::Result;
use chrono::Utc;
use site_tracker_core::models::Availability;

use crate::config::Config;
use crate::fetch::{fetch_snapshot, HttpAvailabilitySource};

pub fn list_sites(config: &Config) {
    println!("{:<16} NAME", "SITE");
    for site in &config.sites {
        println!("{:<16} {}", site.id, site.display_name);
    }
    println!();
    println!("window: {} ({} days)", config.window, config.window.len());
}

/// Fetch current availability and print the free dates per site.
///
/// Touches neither the warehouse nor the mailer.
pub async fn run_check(config: &Config) -> Result<()> {
    let source = HttpAvailabilitySource::new(&config.api)?;
    let snapshot = fetch_snapshot(&source, &config.sites, &config.window, Utc::now()).await?;

    for site in &config.sites {
        let free: Vec<String> = snapshot
            .records
            .iter()
            .filter(|r| r.site == site.id && r.availability == Availability::Available)
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect();

        println!("The free dates for {} are:", site.display_name);
        if free.is_empty() {
            println!("  (none)");
        } else {
            for date in free {
                println!("  {}", date);
            }
        }
    }

    Ok(())
}
