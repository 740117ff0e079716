// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration module registry, settings coercion, and secret handling.
//!
//! The coercion layer is pure: it maps `(slug, incoming, existing)` to a
//! fully specified settings object with defaults applied and secrets merged.
//! The registry layers persistence and redaction on top. Raw settings never
//! leave this crate except through [`ModuleRegistry::raw_settings`], which
//! exists for the dispatcher path only.

pub mod coerce;
pub mod registry;
pub mod secrets;
pub mod slug;

pub use coerce::coerce;
pub use registry::ModuleRegistry;
pub use secrets::{REDACTION_SENTINEL, redact_settings, sha256_hex};
pub use slug::ModuleSlug;
