// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared error taxonomy and domain types for the MyPortal integration core.
//!
//! Every other crate in the workspace depends on this one. It carries no I/O:
//! the event, module, and alert records defined here are plain rows that the
//! storage crate persists and the dispatcher and gateway exchange.

pub mod error;
pub mod types;

pub use error::PortalError;
pub use types::*;
