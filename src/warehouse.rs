//! SQLite-backed [`Warehouse`].
//!
//! Every snapshot is appended as one row per `(site, date)` tagged with its
//! run id and capture timestamp (Unix seconds). The previous snapshot is the
//! run with the greatest `captured_at`; ties go to the later insert.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use site_tracker_core::models::{Availability, AvailabilityRecord, Snapshot};
use site_tracker_core::warehouse::{SnapshotSummary, Warehouse};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;

pub struct SqliteWarehouse {
    pool: SqlitePool,
    table: String,
}

impl SqliteWarehouse {
    /// Connect and make sure the snapshot table exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool, &config.warehouse.table).await?;
        Ok(Self {
            pool,
            table: config.warehouse.table.clone(),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let latest = sqlx::query(&format!(
            "SELECT run_id, captured_at FROM {} ORDER BY captured_at DESC, rowid DESC LIMIT 1",
            self.table
        ))
        .fetch_optional(&self.pool)
        .await?;

        let Some(latest) = latest else {
            return Ok(None);
        };
        let run_id: String = latest.get("run_id");
        let captured_at: i64 = latest.get("captured_at");

        let rows = sqlx::query(&format!(
            "SELECT site, date, availability FROM {} WHERE run_id = ? ORDER BY rowid ASC",
            self.table
        ))
        .bind(&run_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let site: String = row.get("site");
            let date: String = row.get("date");
            let code: i64 = row.get("availability");

            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("bad date '{}' in snapshot {}", date, run_id))?;
            let availability = Availability::from_code(code)
                .ok_or_else(|| anyhow!("bad availability code {} in snapshot {}", code, run_id))?;
            records.push(AvailabilityRecord::new(site, date, availability));
        }

        Ok(Some(Snapshot {
            run_id,
            captured_at: timestamp(captured_at)?,
            records,
        }))
    }

    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} (run_id, site, date, availability, captured_at) VALUES (?, ?, ?, ?, ?)",
            self.table
        );
        let captured_at = snapshot.captured_at.timestamp();

        let mut tx = self.pool.begin().await?;
        for rec in &snapshot.records {
            sqlx::query(&sql)
                .bind(&snapshot.run_id)
                .bind(&rec.site)
                .bind(rec.date.format("%Y-%m-%d").to_string())
                .bind(rec.availability.code())
                .bind(captured_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(snapshot.len())
    }

    async fn list_snapshots(&self, limit: usize) -> Result<Vec<SnapshotSummary>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT run_id,
                   MAX(captured_at) AS captured_at,
                   COUNT(*) AS row_count,
                   SUM(CASE WHEN availability = 0 THEN 1 ELSE 0 END) AS available
            FROM {}
            GROUP BY run_id
            ORDER BY captured_at DESC, MAX(rowid) DESC
            LIMIT ?
            "#,
            self.table
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SnapshotSummary> {
                let captured_at: i64 = row.get("captured_at");
                let row_count: i64 = row.get("row_count");
                let available: i64 = row.get("available");
                Ok(SnapshotSummary {
                    run_id: row.get("run_id"),
                    captured_at: timestamp(captured_at)?,
                    rows: row_count as usize,
                    available: available as usize,
                })
            })
            .collect()
    }
}

fn timestamp(ts: i64) -> Result<DateTime<chrono::Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("bad capture timestamp {}", ts))
}
