// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types live in `myportal-core::types` so they can cross crate
//! boundaries without dragging in the storage stack. This module re-exports
//! them for convenience within the storage crate.

pub use myportal_core::types::{
    AlertRecord, AttemptRecord, EmailTrackingEvent, EventStatus, MessageTemplate, ModuleRecord,
    NewWebhookEvent, Ticket, TicketReply, TicketTask, TrackingEventType, WebhookEvent,
};
