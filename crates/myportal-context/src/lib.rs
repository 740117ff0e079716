// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context flattening, `{{TOKEN}}` interpolation, system variables, and the
//! cached message-template store.

pub mod flatten;
pub mod interpolate;
pub mod system;
pub mod templates;

pub use flatten::flatten_context;
pub use interpolate::{interpolate, interpolate_html};
pub use system::system_variables;
pub use templates::TemplateStore;
