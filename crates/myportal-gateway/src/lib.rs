// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway built on axum.
//!
//! Hosts the inbound webhook endpoints (SMTP2Go event correlation, Uptime
//! Kuma alerts, the Xero callback probe), the email tracking endpoints the
//! outbound pipeline points recipients at, and the read-only API over
//! integration modules and webhook events.

pub mod events;
pub mod modules;
pub mod server;
pub mod smtp2go;
pub mod templates;
pub mod tracking;
pub mod uptimekuma;
pub mod xero;

pub use server::{AppState, ServerConfig, router, start_server};
