//! # Site Tracker
//!
//! Polls a booking-availability API for a fixed set of sites, compares the
//! result against the last snapshot stored in the warehouse, and emails a
//! summary when dates open up.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌───────────┐   ┌────────────┐
//! │  Fetcher   │──▶│    Diff    │──▶│ Warehouse │   │  Notifier  │
//! │ (HTTP API) │   │ prev ⋈ curr│──▶│  (SQLite) │   │ (Mailjet)  │
//! └────────────┘   └─────┬──────┘   └───────────┘   └─────▲──────┘
//!                        └────────────────────────────────┘
//! ```
//!
//! A run is a single pass with no concurrency. State lives only in the
//! warehouse; each run re-reads it.
//!
//! ## Quick Start
//!
//! ```bash
//! site-tracker init                 # create the warehouse table
//! site-tracker check                # print free dates, no side effects
//! site-tracker run                  # fetch, diff, persist, notify
//! site-tracker serve                # HTTP trigger for schedulers
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML config, sites file, credentials |
//! | [`fetch`] | Availability API client |
//! | [`warehouse`] | SQLite snapshot store |
//! | [`pipeline`] | Run orchestration and failure dispatch |
//! | [`render`] | Summary/error email HTML |
//! | [`mailer`] | Email transports |
//! | [`server`] | HTTP trigger endpoint |
//!
//! The diff, digest and storage trait live in `site_tracker_core`.

pub mod config;
pub mod db;
pub mod fetch;
pub mod history;
pub mod mailer;
pub mod migrate;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod sites;
pub mod warehouse;
