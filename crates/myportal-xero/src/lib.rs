// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Xero integration: invoice payload construction and an API client with
//! cached, single-flight OAuth2 token refresh.

pub mod client;
pub mod invoices;
pub mod oauth;

pub use client::{Tenant, XeroClient};
pub use invoices::{Invoice, InvoiceParams, LineItem, OrderItem};
pub use oauth::TokenCache;
