//! `site-tracker history`: list persisted snapshots, newest first.

use anyhow::Result;
use site_tracker_core::warehouse::Warehouse;

use crate::config::Config;
use crate::warehouse::SqliteWarehouse;

pub async fn run_history(config: &Config, limit: usize) -> Result<()> {
    let warehouse = SqliteWarehouse::open(config).await?;
    let snapshots = warehouse.list_snapshots(limit).await?;
    warehouse.close().await;

    if snapshots.is_empty() {
        println!("No snapshots stored.");
        return Ok(());
    }

    println!(
        "{:<22} {:<38} {:>6} {:>10}",
        "CAPTURED", "RUN", "ROWS", "AVAILABLE"
    );
    for s in &snapshots {
        println!(
            "{:<22} {:<38} {:>6} {:>10}",
            s.captured_at.format("%Y-%m-%dT%H:%M:%SZ"),
            s.run_id,
            s.rows,
            s.available
        );
    }
    println!("snapshots: {}", snapshots.len());

    Ok(())
}
