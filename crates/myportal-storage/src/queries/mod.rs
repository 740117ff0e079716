// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per storage entity.

pub mod alerts;
pub mod events;
pub mod modules;
pub mod replies;
pub mod templates;
pub mod tickets;
pub mod tracking;
