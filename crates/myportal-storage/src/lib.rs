// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the MyPortal integration core.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for
//! modules, webhook events and attempts, ticket-reply tracking columns,
//! email tracking events, Uptime Kuma alerts, and message templates.

pub mod database;
pub mod lock;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
