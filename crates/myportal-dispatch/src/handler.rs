// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handler seam: one trait, one statically-enumerated registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use myportal_core::PortalError;
use myportal_modules::ModuleSlug;
use serde_json::Value;

/// What a handler declares before any event row exists.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub target_url: Option<String>,
    pub max_attempts: i64,
}

impl Prepared {
    pub fn single_attempt(target_url: Option<String>) -> Self {
        Self {
            target_url,
            max_attempts: 1,
        }
    }
}

/// Result of one handler execution.
#[derive(Debug)]
pub enum HandlerOutput {
    Success {
        response_status: Option<i64>,
        response: Value,
    },
    /// The handler ran and found nothing to do.
    Skipped { reason: String },
}

/// Execution failure, carrying whatever response detail the transport saw so
/// the dispatcher can record it on the attempt.
#[derive(Debug)]
pub struct HandlerError {
    pub source: PortalError,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
}

impl From<PortalError> for HandlerError {
    fn from(source: PortalError) -> Self {
        Self {
            source,
            response_status: None,
            response_body: None,
        }
    }
}

impl HandlerError {
    pub fn with_response(source: PortalError, status: i64, body: String) -> Self {
        Self {
            source,
            response_status: Some(status),
            response_body: Some(body),
        }
    }
}

/// One integration handler.
///
/// `prepare` does configuration and payload validation only; its errors
/// surface synchronously from `trigger_module` and never produce an event
/// row. `execute` performs the exchange.
#[async_trait]
pub trait ModuleHandler: Send + Sync {
    /// Verb for the event name, e.g. `send` in `module.ntfy.send`.
    fn verb(&self) -> &'static str;

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError>;

    async fn execute(&self, settings: &Value, payload: &Value)
    -> Result<HandlerOutput, HandlerError>;
}

/// Slug-to-handler table, enumerated once at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ModuleSlug, Arc<dyn ModuleHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slug: ModuleSlug, handler: Arc<dyn ModuleHandler>) {
        self.handlers.insert(slug, handler);
    }

    pub fn get(&self, slug: ModuleSlug) -> Option<Arc<dyn ModuleHandler>> {
        self.handlers.get(&slug).cloned()
    }
}

/// Read a string payload field, accepting numbers for convenience.
pub(crate) fn payload_str(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer payload field, coercing numeric strings.
pub(crate) fn payload_i64(payload: &Value, key: &str) -> Option<i64> {
    match payload.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn setting_str<'a>(settings: &'a Value, key: &str) -> &'a str {
    settings.get(key).and_then(Value::as_str).unwrap_or("")
}
