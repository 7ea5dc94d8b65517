//! # Site Tracker Core
//!
//! Pure logic for Site Tracker: availability models, the snapshot diff and
//! persistence gate, notification digest building, and the warehouse trait.
//!
//! This crate contains no tokio, sqlx, reqwest, or filesystem I/O. The
//! binary crate wires these pieces to real HTTP, SQLite, and email.

pub mod diff;
pub mod digest;
pub mod models;
pub mod warehouse;
