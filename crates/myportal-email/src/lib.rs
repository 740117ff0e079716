// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound email for the MyPortal integration core.
//!
//! One entry point, two transports: the SMTP2Go HTTP API (with optional
//! open/click tracking) and a plain SMTP relay via `lettre`. Routing between
//! them follows the `smtp2go` and `smtp` module configurations.

pub mod pipeline;
pub mod relay;
pub mod smtp2go;
pub mod tracking;

pub use pipeline::{EmailPipeline, EmailRequest, EmailRoute, SendOutcome};
pub use smtp2go::Smtp2goClient;
