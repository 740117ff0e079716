// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `trigger_module`: slug resolution, event bookkeeping, and background
//! execution.
//!
//! Error discipline: configuration problems (unknown slug, missing module
//! row, failed `prepare`) surface synchronously and never create event rows.
//! Execution problems are recorded as failed attempts; background crashes
//! never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use myportal_core::{DispatchOutcome, EventStatus, NewWebhookEvent, PortalError};
use myportal_email::EmailPipeline;
use myportal_modules::{ModuleRegistry, ModuleSlug};
use myportal_storage::Database;
use myportal_storage::queries::events;
use myportal_xero::{TokenCache, XeroClient};
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::handler::{HandlerOutput, HandlerRegistry, ModuleHandler};
use crate::handlers;
use crate::handlers::unifi_talk::RecordingSync;

/// Completion hook for `trigger_module`, invoked once with the terminal
/// outcome after the attempt settles. For background dispatch this runs on
/// the tracked task; it is not called when the module is disabled or when
/// preparation fails before an event row exists.
pub type OnComplete = Box<dyn FnOnce(DispatchOutcome) + Send + 'static>;

/// Shared services wired into the handler table at startup.
#[derive(Clone)]
pub struct Services {
    pub db: Database,
    pub registry: ModuleRegistry,
    pub email: EmailPipeline,
    pub http: reqwest::Client,
    pub xero_tokens: Arc<TokenCache>,
    pub xero: XeroClient,
    pub recordings: Arc<dyn RecordingSync>,
    pub public_url: String,
}

impl Services {
    /// Default HTTP client for handler traffic.
    pub fn http_client(
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<reqwest::Client, PortalError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| PortalError::transport("failed to build HTTP client", e))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    db: Database,
    registry: ModuleRegistry,
    handlers: HandlerRegistry,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Build the dispatcher with the full handler table.
    pub fn new(services: Services) -> Self {
        let mut handlers = HandlerRegistry::new();
        handlers::register_all(&mut handlers, &services);
        Self::with_handlers(services, handlers)
    }

    pub fn with_handlers(services: Services, handlers: HandlerRegistry) -> Self {
        Self {
            db: services.db,
            registry: services.registry,
            handlers,
            tracker: TaskTracker::new(),
        }
    }

    /// Dispatch a payload to the module identified by `slug`.
    ///
    /// With `background` set, the outcome reports the pending event id and
    /// execution continues on a tracked task.
    pub async fn trigger_module(
        &self,
        slug: &str,
        payload: Value,
        background: bool,
        on_complete: Option<OnComplete>,
    ) -> Result<DispatchOutcome, PortalError> {
        let slug: ModuleSlug = slug
            .parse()
            .map_err(|_| PortalError::Config(format!("unknown module slug: {slug}")))?;
        let handler = self
            .handlers
            .get(slug)
            .ok_or_else(|| PortalError::HandlerNotFound {
                slug: slug.to_string(),
            })?;

        let (enabled, settings) = self.registry.raw_settings(slug).await?;
        if !enabled {
            info!(module = %slug, "dispatch skipped: module disabled");
            return Ok(DispatchOutcome {
                event_id: None,
                status: EventStatus::Skipped,
                response: None,
                reason: Some("Module disabled".to_string()),
            });
        }

        let prepared = handler.prepare(&settings, &payload)?;
        let event_id = events::insert_event(
            &self.db,
            &NewWebhookEvent {
                name: format!("module.{slug}.{}", handler.verb()),
                slug: Some(slug.to_string()),
                target_url: prepared.target_url,
                payload: payload.clone(),
                max_attempts: prepared.max_attempts,
                correlation_ids: None,
            },
        )
        .await?;

        if background {
            let db = self.db.clone();
            self.tracker.spawn(async move {
                match run_attempt(&db, event_id, handler, settings, payload).await {
                    Ok(outcome) => {
                        if let Some(hook) = on_complete {
                            hook(outcome);
                        }
                    }
                    Err(e) => {
                        // Recorded on the event; never reaches a request cycle.
                        error!(event_id, error = %e, "background dispatch bookkeeping failed");
                    }
                }
            });
            return Ok(DispatchOutcome {
                event_id: Some(event_id),
                status: EventStatus::Pending,
                response: None,
                reason: None,
            });
        }

        let outcome = run_attempt(&self.db, event_id, handler, settings, payload).await?;
        if let Some(hook) = on_complete {
            hook(outcome.clone());
        }
        Ok(outcome)
    }

    /// Wait for in-flight background dispatches to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_attempt(
    db: &Database,
    event_id: i64,
    handler: Arc<dyn ModuleHandler>,
    settings: Value,
    payload: Value,
) -> Result<DispatchOutcome, PortalError> {
    let attempt = events::begin_attempt(db, event_id).await?;

    match handler.execute(&settings, &payload).await {
        Ok(HandlerOutput::Success {
            response_status,
            response,
        }) => {
            events::record_success(
                db,
                event_id,
                attempt,
                response_status,
                Some(&response.to_string()),
            )
            .await?;
            info!(event_id, attempt, "dispatch succeeded");
            Ok(DispatchOutcome {
                event_id: Some(event_id),
                status: EventStatus::Succeeded,
                response: Some(response),
                reason: None,
            })
        }
        Ok(HandlerOutput::Skipped { reason }) => {
            events::record_skipped(db, event_id, attempt, &reason).await?;
            info!(event_id, attempt, reason = %reason, "dispatch skipped");
            Ok(DispatchOutcome {
                event_id: Some(event_id),
                status: EventStatus::Skipped,
                response: None,
                reason: Some(reason),
            })
        }
        Err(failure) => {
            let message = failure.source.to_string();
            events::record_failure(
                db,
                event_id,
                attempt,
                &message,
                failure.response_status,
                failure.response_body.as_deref(),
            )
            .await?;
            warn!(event_id, attempt, error = %message, "dispatch failed");
            Ok(DispatchOutcome {
                event_id: Some(event_id),
                status: EventStatus::Failed,
                response: None,
                reason: Some(message),
            })
        }
    }
}
