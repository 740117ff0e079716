// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module dispatch: a per-slug handler table driven by the module registry,
//! with every exchange recorded as a webhook event.

pub mod dispatcher;
pub mod handler;
pub mod handlers;

pub use dispatcher::{Dispatcher, Services};
pub use handler::{HandlerError, HandlerOutput, HandlerRegistry, ModuleHandler, Prepared};
pub use handlers::unifi_talk::{NoRecordingCollaborator, RecordingSync};
