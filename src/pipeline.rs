//! Run orchestration.
//!
//! One run is a straight line: fetch → diff → persist → notify.
//!
//! [`Pipeline::execute`] performs the work and returns either a
//! [`RunOutcome`] (report plus the summary email to send, if any) or a
//! [`RunError`] tagged with the failing stage. [`Pipeline::run`] inspects
//! that result and dispatches to exactly one of the two notifications:
//! the summary on success, the error email on failure. Nothing is retried.
//!
//! [`load_run_config`] extends the same rule to configuration: once the
//! notify section has loaded, any later config failure is emailed too.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use site_tracker_core::diff::{diff, PersistDecision};
use site_tracker_core::digest::build_digest;
use site_tracker_core::warehouse::Warehouse;
use std::path::Path;

use crate::config::{self, Config, NotifyConfig};
use crate::fetch::{fetch_snapshot, AvailabilitySource, HttpAvailabilitySource};
use crate::mailer::{create_mailer, Email, LogMailer, Mailer};
use crate::render;
use crate::warehouse::SqliteWarehouse;

/// A run failure, tagged by the stage it happened in. Each variant carries
/// the full error chain as its diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("warehouse error: {0:#}")]
    Warehouse(anyhow::Error),

    #[error("notification failed: {0:#}")]
    Notify(anyhow::Error),
}

impl RunError {
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Fetch(_) => "fetch",
            RunError::Warehouse(_) => "warehouse",
            RunError::Notify(_) => "notify",
        }
    }

    /// Formatted error chain, including a backtrace when one was captured.
    pub fn diagnostic(&self) -> String {
        let inner = match self {
            RunError::Config(e)
            | RunError::Fetch(e)
            | RunError::Warehouse(e)
            | RunError::Notify(e) => e,
        };
        format!("{:?}", inner)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub captured_at: DateTime<Utc>,
    pub sites: usize,
    pub records: usize,
    pub newly_available: usize,
    pub newly_booked: usize,
    pub unchanged: usize,
    pub persist: PersistDecision,
    /// False when the gate said no or persistence was disabled.
    pub persisted: bool,
    pub notified: bool,
}

/// Result of [`Pipeline::execute`]: the report and the summary to send.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub summary: Option<Email>,
}

/// Borrowed collaborators for one run.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub source: &'a dyn AvailabilitySource,
    pub warehouse: &'a dyn Warehouse,
    pub mailer: &'a dyn Mailer,
    /// When false the persistence gate is evaluated but nothing is written.
    pub persist: bool,
}

impl Pipeline<'_> {
    /// Fetch, diff, and persist. Does not send anything.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        let config = self.config;

        let current = fetch_snapshot(self.source, &config.sites, &config.window, now)
            .await
            .map_err(RunError::Fetch)?;

        let previous = self
            .warehouse
            .latest_snapshot()
            .await
            .context("reading previous snapshot")
            .map_err(RunError::Warehouse)?;

        match &previous {
            Some(prev) => tracing::info!(
                run_id = %prev.run_id,
                captured_at = %prev.captured_at,
                rows = prev.len(),
                "loaded previous snapshot"
            ),
            None => tracing::info!("no previous snapshot"),
        }

        let report = diff(previous.as_ref(), &current, config.diff.missing_previous);
        let decision = report.persist_decision();
        let newly_available = report.newly_available().count();
        let newly_booked = report.newly_booked().count();
        let unchanged = report.unchanged().count();

        tracing::info!(
            newly_available,
            newly_booked,
            unchanged,
            decision = ?decision,
            "diffed snapshots"
        );

        let mut persisted = false;
        if decision.should_write() {
            if current.is_empty() {
                // Zero rows would not become the previous snapshot.
                tracing::warn!("fetched snapshot is empty, nothing to write");
            } else if self.persist {
                let written = self
                    .warehouse
                    .append_snapshot(&current)
                    .await
                    .context("appending current snapshot")
                    .map_err(RunError::Warehouse)?;
                tracing::info!(run_id = %current.run_id, rows = written, "persisted snapshot");
                persisted = true;
            } else {
                tracing::info!("persistence disabled, snapshot not written");
            }
        } else {
            tracing::info!("nothing changed, snapshot not written");
        }

        let summary = if report.should_notify() {
            let digest = build_digest(&config.sites, &current, &report, now.date_naive());
            let html = render::render_summary(&digest).map_err(RunError::Notify)?;
            Some(Email::from_notify(
                &config.notify,
                render::summary_subject(&digest),
                html,
            ))
        } else {
            None
        };

        Ok(RunOutcome {
            report: RunReport {
                run_id: current.run_id.clone(),
                captured_at: current.captured_at,
                sites: config.sites.len(),
                records: current.len(),
                newly_available,
                newly_booked,
                unchanged,
                persist: decision,
                persisted,
                notified: summary.is_some(),
            },
            summary,
        })
    }

    /// Execute and dispatch the matching notification.
    ///
    /// Success sends the summary (if any). Any failure, including a failed
    /// summary send, sends one error email instead.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let result = match self.execute(now).await {
            Ok(outcome) => self.send_summary(outcome).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            notify_failure(&self.config.notify, self.mailer, e).await;
        }
        result
    }

    async fn send_summary(&self, outcome: RunOutcome) -> Result<RunReport, RunError> {
        if let Some(email) = &outcome.summary {
            self.mailer
                .send(email)
                .await
                .with_context(|| format!("sending summary via {}", self.mailer.name()))
                .map_err(RunError::Notify)?;
            tracing::info!(to = %email.to_email, subject = %email.subject, "summary sent");
        }
        Ok(outcome.report)
    }
}

/// Run once against the real API, SQLite warehouse and configured mailer.
///
/// `dry_run` skips persistence and logs emails instead of sending them.
pub async fn run_once(config: &Config, dry_run: bool) -> Result<RunReport, RunError> {
    let mailer: Box<dyn Mailer> = if dry_run {
        Box::new(LogMailer)
    } else {
        create_mailer(config.notify.transport, config.mailjet.as_ref())
            .map_err(RunError::Notify)?
    };

    let source = match HttpAvailabilitySource::new(&config.api) {
        Ok(source) => source,
        Err(e) => {
            let err = RunError::Fetch(e);
            notify_failure(&config.notify, mailer.as_ref(), &err).await;
            return Err(err);
        }
    };

    let warehouse = match SqliteWarehouse::open(config).await {
        Ok(wh) => wh,
        Err(e) => {
            let err = RunError::Warehouse(e.context("opening warehouse"));
            notify_failure(&config.notify, mailer.as_ref(), &err).await;
            return Err(err);
        }
    };

    let pipeline = Pipeline {
        config,
        source: &source,
        warehouse: &warehouse,
        mailer: mailer.as_ref(),
        persist: !dry_run,
    };
    let result = pipeline.run(Utc::now()).await;

    warehouse.close().await;
    result
}

/// Load the configuration for a run.
///
/// The notify section and credentials load first. If they fail no mailer
/// can exist and the error is only returned. Any later failure (sites file,
/// window, api, warehouse) is also sent as one error email.
pub async fn load_run_config(path: &Path, dry_run: bool) -> Result<Config, RunError> {
    let settings = config::load_notify(path).map_err(|e| RunError::Config(e.into()))?;

    match config::load_config(path) {
        Ok(config) => Ok(config),
        Err(e) => {
            let err = RunError::Config(e.into());
            let mailer: Box<dyn Mailer> = if dry_run {
                Box::new(LogMailer)
            } else {
                match create_mailer(settings.notify.transport, settings.mailjet.as_ref()) {
                    Ok(mailer) => mailer,
                    Err(mailer_err) => {
                        tracing::error!("could not create mailer: {:#}", mailer_err);
                        return Err(err);
                    }
                }
            };
            notify_failure(&settings.notify, mailer.as_ref(), &err).await;
            Err(err)
        }
    }
}

async fn notify_failure(notify: &NotifyConfig, mailer: &dyn Mailer, error: &RunError) {
    tracing::error!(stage = error.stage(), "run failed: {}", error);
    match render::render_error(error.stage(), &error.diagnostic()) {
        Ok(html) => {
            let email = Email::from_notify(notify, render::ERROR_SUBJECT, html);
            if let Err(e) = mailer.send(&email).await {
                tracing::error!("could not send error email: {:#}", e);
            }
        }
        Err(e) => tracing::error!("could not render error email: {:#}", e),
    }
}

/// CLI entry point for `site-tracker run`.
pub async fn run_cmd(config: &Config, dry_run: bool) -> Result<(), RunError> {
    let report = run_once(config, dry_run).await?;

    let decision = match report.persist {
        PersistDecision::FirstSnapshot => "first snapshot",
        PersistDecision::Changed { .. } => "changed",
        PersistDecision::Unchanged => "unchanged",
    };

    println!("run {}{}", report.run_id, if dry_run { " (dry-run)" } else { "" });
    println!("  sites: {}", report.sites);
    println!("  records: {}", report.records);
    println!("  newly available: {}", report.newly_available);
    println!("  newly booked: {}", report.newly_booked);
    println!("  unchanged: {}", report.unchanged);
    println!(
        "  persisted: {} ({})",
        if report.persisted { "yes" } else { "no" },
        decision
    );
    println!("  notified: {}", if report.notified { "yes" } else { "no" });
    println!("ok");

    Ok(())
}
