// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The email send pipeline.
//!
//! Routing: `smtp2go` module enabled wins; otherwise a configured
//! `smtp_host` on the `smtp` module selects the relay; otherwise the send is
//! dropped with a warning. Configuration problems (missing `api_key`, no
//! resolvable sender) surface before any event row exists.

use myportal_core::{NewWebhookEvent, PortalError};
use myportal_modules::{ModuleRegistry, ModuleSlug};
use myportal_storage::queries::{events, replies};
use myportal_storage::Database;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::relay::{self, RelayConfig, RelayMessage};
use crate::smtp2go::{Smtp2goClient, Smtp2goSend};
use crate::tracking;

/// Input to [`EmailPipeline::send_email`].
#[derive(Debug, Clone, Default)]
pub struct EmailRequest {
    pub subject: String,
    pub recipients: Vec<String>,
    pub html_body: String,
    pub text_body: Option<String>,
    pub sender: Option<String>,
    pub reply_to: Option<String>,
    /// Enables open/click tracking when the `smtp2go` module has
    /// `enable_tracking` set.
    pub ticket_reply_id: Option<i64>,
}

/// Result of a send: whether anything left the building, plus provider
/// metadata when it did.
#[derive(Debug)]
pub struct SendOutcome {
    pub sent: bool,
    pub metadata: Option<Value>,
}

impl SendOutcome {
    fn dropped() -> Self {
        Self {
            sent: false,
            metadata: None,
        }
    }
}

/// The transport chosen for a send, with the raw settings it needs.
#[derive(Debug)]
pub enum EmailRoute {
    Smtp2go(Value),
    Relay(Value),
    None,
}

#[derive(Clone)]
pub struct EmailPipeline {
    db: Database,
    registry: ModuleRegistry,
    client: Smtp2goClient,
    public_url: String,
}

/// Provider delivery details handed back to dispatcher handlers.
#[derive(Debug)]
pub struct DeliveryReport {
    pub message_id: Option<String>,
    pub tracking_id: Option<String>,
    pub response_status: u16,
    pub response_body: Value,
}

impl EmailPipeline {
    pub fn new(
        db: Database,
        registry: ModuleRegistry,
        client: Smtp2goClient,
        public_url: String,
    ) -> Self {
        Self {
            db,
            registry,
            client,
            public_url,
        }
    }

    /// Pick the transport for outbound mail.
    pub async fn route(&self) -> Result<EmailRoute, PortalError> {
        let (enabled, settings) = self.registry.raw_settings(ModuleSlug::Smtp2go).await?;
        if enabled {
            return Ok(EmailRoute::Smtp2go(settings));
        }
        let (_, smtp_settings) = self.registry.raw_settings(ModuleSlug::Smtp).await?;
        if !setting_str(&smtp_settings, "smtp_host").is_empty() {
            return Ok(EmailRoute::Relay(smtp_settings));
        }
        Ok(EmailRoute::None)
    }

    /// Full send: routing, event bookkeeping, delivery.
    pub async fn send_email(&self, request: &EmailRequest) -> Result<SendOutcome, PortalError> {
        let mut request = request.clone();
        request.recipients = normalize_recipients(&request.recipients);
        if request.recipients.is_empty() {
            warn!(subject = %request.subject, "email send dropped: no recipients");
            return Ok(SendOutcome::dropped());
        }

        match self.route().await? {
            EmailRoute::Smtp2go(settings) => self.send_via_smtp2go(&request, &settings).await,
            EmailRoute::Relay(settings) => self.send_via_relay(&request, &settings).await,
            EmailRoute::None => {
                warn!(subject = %request.subject, "email send dropped: no transport configured");
                Ok(SendOutcome::dropped())
            }
        }
    }

    async fn send_via_smtp2go(
        &self,
        request: &EmailRequest,
        settings: &Value,
    ) -> Result<SendOutcome, PortalError> {
        // Configuration failures must precede event creation.
        smtp2go_send_config(settings, request.sender.as_deref())?;

        let event_id = events::insert_event(
            &self.db,
            &NewWebhookEvent {
                name: "module.smtp2go.send_email".to_string(),
                slug: Some(ModuleSlug::Smtp2go.to_string()),
                target_url: Some("https://api.smtp2go.com/v3/email/send".to_string()),
                payload: send_snapshot(request),
                max_attempts: 1,
                correlation_ids: request
                    .ticket_reply_id
                    .map(|id| json!({"ticket_reply_id": id})),
            },
        )
        .await?;
        let attempt = events::begin_attempt(&self.db, event_id).await?;

        match self.deliver_smtp2go(request, settings).await {
            Ok(report) => {
                events::record_success(
                    &self.db,
                    event_id,
                    attempt,
                    Some(i64::from(report.response_status)),
                    Some(&report.response_body.to_string()),
                )
                .await?;
                if let Some(message_id) = &report.message_id {
                    events::merge_correlation(
                        &self.db,
                        event_id,
                        json!({"smtp2go_message_id": message_id}),
                    )
                    .await?;
                }
                info!(event_id, "email sent via smtp2go");
                Ok(SendOutcome {
                    sent: true,
                    metadata: Some(json!({
                        "provider": "smtp2go",
                        "email_id": report.message_id,
                        "smtp2go_message_id": report.message_id,
                        "tracking_id": report.tracking_id,
                    })),
                })
            }
            Err(e) => {
                events::record_failure(&self.db, event_id, attempt, &e.to_string(), None, None)
                    .await?;
                Err(e)
            }
        }
    }

    async fn send_via_relay(
        &self,
        request: &EmailRequest,
        settings: &Value,
    ) -> Result<SendOutcome, PortalError> {
        let config = relay_config_from_settings(settings)?;
        let from = resolve_relay_sender(settings, request.sender.as_deref())?;

        let event_id = events::insert_event(
            &self.db,
            &NewWebhookEvent {
                name: "module.smtp.send_email".to_string(),
                slug: Some(ModuleSlug::Smtp.to_string()),
                target_url: Some(format!("smtp://{}:{}", config.host, config.port)),
                payload: send_snapshot(request),
                max_attempts: 1,
                correlation_ids: None,
            },
        )
        .await?;
        let attempt = events::begin_attempt(&self.db, event_id).await?;

        let message = RelayMessage {
            from,
            to: request.recipients.clone(),
            reply_to: request.reply_to.clone(),
            subject: request.subject.clone(),
            html_body: request.html_body.clone(),
            text_body: request.text_body.clone(),
        };
        match relay::send(&config, &message).await {
            Ok(()) => {
                events::record_success(&self.db, event_id, attempt, None, None).await?;
                info!(event_id, "email sent via smtp relay");
                Ok(SendOutcome {
                    sent: true,
                    metadata: Some(json!({"provider": "smtp"})),
                })
            }
            Err(e) => {
                events::record_failure(&self.db, event_id, attempt, &e.to_string(), None, None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Provider send without event bookkeeping; the dispatcher owns the
    /// event lifecycle on its path.
    pub async fn deliver_smtp2go(
        &self,
        request: &EmailRequest,
        settings: &Value,
    ) -> Result<DeliveryReport, PortalError> {
        let (api_key, sender) = smtp2go_send_config(settings, request.sender.as_deref())?;

        let tracking_enabled = settings
            .get("enable_tracking")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut html_body = request.html_body.clone();
        let mut tracking_id = None;
        if let Some(reply_id) = request.ticket_reply_id
            && tracking_enabled
        {
            let tid = tracking::new_tracking_id();
            let base = self.public_url.trim_end_matches('/');
            html_body = tracking::rewrite_links(&html_body, &self.public_url, &tid);
            html_body =
                tracking::inject_pixel(&html_body, &format!("{base}/t/open.gif?tid={tid}"));
            info!(reply_id, "tracking instrumentation applied");
            tracking_id = Some(tid);
        }

        let delivery = self
            .client
            .send(&Smtp2goSend {
                api_key,
                to: request.recipients.clone(),
                sender,
                subject: request.subject.clone(),
                html_body,
                text_body: request.text_body.clone(),
                custom_headers: request
                    .reply_to
                    .as_ref()
                    .map(|addr| json!([{"header": "Reply-To", "value": addr}])),
            })
            .await?;

        // Without a provider message id the inbound correlator could never
        // match, so nothing is persisted on the reply.
        match (&delivery.message_id, &tracking_id, request.ticket_reply_id) {
            (Some(message_id), Some(tid), Some(reply_id)) => {
                replies::set_email_correlation(&self.db, reply_id, tid, message_id).await?;
            }
            (None, _, Some(reply_id)) => {
                warn!(reply_id, "smtp2go returned no message id, tracking not persisted");
            }
            _ => {}
        }

        Ok(DeliveryReport {
            message_id: delivery.message_id,
            tracking_id,
            response_status: delivery.response_status,
            response_body: delivery.response_body,
        })
    }

    /// Relay send without event bookkeeping, for the dispatcher path.
    pub async fn deliver_relay(
        &self,
        request: &EmailRequest,
        settings: &Value,
    ) -> Result<(), PortalError> {
        let config = relay_config_from_settings(settings)?;
        let from = resolve_relay_sender(settings, request.sender.as_deref())?;
        relay::send(
            &config,
            &RelayMessage {
                from,
                to: request.recipients.clone(),
                reply_to: request.reply_to.clone(),
                subject: request.subject.clone(),
                html_body: request.html_body.clone(),
                text_body: request.text_body.clone(),
            },
        )
        .await
    }
}

/// Trim, drop empties, and dedupe while preserving order.
pub fn normalize_recipients(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .filter(|r| seen.insert(r.to_ascii_lowercase()))
        .collect()
}

/// Resolve the API key and sender for an SMTP2Go send.
pub fn smtp2go_send_config(
    settings: &Value,
    sender_arg: Option<&str>,
) -> Result<(String, String), PortalError> {
    let api_key = setting_str(settings, "api_key");
    if api_key.is_empty() {
        return Err(PortalError::Config(
            "smtp2go module has no api_key configured".to_string(),
        ));
    }
    let sender = match sender_arg.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => {
            let fallback = setting_str(settings, "smtp_user");
            if fallback.is_empty() {
                return Err(PortalError::Config(
                    "no sender address: pass one explicitly or set smtp_user on the smtp2go module"
                        .to_string(),
                ));
            }
            fallback.to_string()
        }
    };
    Ok((api_key.to_string(), sender))
}

/// Build a relay config from the `smtp` module settings.
pub fn relay_config_from_settings(settings: &Value) -> Result<RelayConfig, PortalError> {
    let host = setting_str(settings, "smtp_host");
    if host.is_empty() {
        return Err(PortalError::Config(
            "smtp module has no smtp_host configured".to_string(),
        ));
    }
    let port = setting_str(settings, "smtp_port")
        .parse::<u16>()
        .unwrap_or(587);
    Ok(RelayConfig {
        host: host.to_string(),
        port,
        username: setting_str(settings, "smtp_user").to_string(),
        password: setting_str(settings, "smtp_password").to_string(),
        use_starttls: settings
            .get("use_starttls")
            .and_then(Value::as_bool)
            .unwrap_or(true),
    })
}

fn resolve_relay_sender(settings: &Value, sender_arg: Option<&str>) -> Result<String, PortalError> {
    sender_arg
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| {
            let from = setting_str(settings, "from_address");
            (!from.is_empty()).then(|| from.to_string())
        })
        .or_else(|| {
            let user = setting_str(settings, "smtp_user");
            (!user.is_empty()).then(|| user.to_string())
        })
        .ok_or_else(|| {
            PortalError::Config("no sender address for smtp relay send".to_string())
        })
}

fn setting_str<'a>(settings: &'a Value, key: &str) -> &'a str {
    settings.get(key).and_then(Value::as_str).unwrap_or("")
}

fn send_snapshot(request: &EmailRequest) -> Value {
    json!({
        "subject": request.subject,
        "to": request.recipients,
        "ticket_reply_id": request.ticket_reply_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use myportal_core::EventStatus;
    use myportal_storage::queries::tickets::{self, NewTicket};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(base: &str) -> (EmailPipeline, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let registry = ModuleRegistry::new(db.clone());
        registry.ensure_defaults().await.unwrap();
        let client = Smtp2goClient::new(Duration::from_secs(5), Duration::from_secs(2))
            .unwrap()
            .with_base_url(base.to_string());
        let pipeline = EmailPipeline::new(
            db.clone(),
            registry,
            client,
            "https://portal.example.com".to_string(),
        );
        (pipeline, db, dir)
    }

    async fn enable_smtp2go(pipeline: &EmailPipeline, extra: Value) {
        let mut settings = json!({"api_key": "api-TEST", "smtp_user": "portal@example.com"});
        if let (Some(base), Some(add)) = (settings.as_object_mut(), extra.as_object()) {
            for (k, v) in add {
                base.insert(k.clone(), v.clone());
            }
        }
        pipeline
            .registry
            .update_module(ModuleSlug::Smtp2go, Some(true), Some(&settings))
            .await
            .unwrap();
    }

    fn request(recipients: &[&str]) -> EmailRequest {
        EmailRequest {
            subject: "Hello".to_string(),
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            html_body: "<html><body><p>Hi</p></body></html>".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn recipients_normalized_and_deduped() {
        let normalized = normalize_recipients(&[
            " a@b.example ".to_string(),
            String::new(),
            "A@B.example".to_string(),
            "c@d.example".to_string(),
        ]);
        assert_eq!(normalized, vec!["a@b.example", "c@d.example"]);
    }

    #[tokio::test]
    async fn empty_recipients_drop_without_event() {
        let (pipeline, db, _dir) = setup("http://unused.invalid").await;
        let outcome = pipeline.send_email(&request(&["", "  "])).await.unwrap();
        assert!(!outcome.sent);
        assert!(events::list_events(&db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_transport_drops_without_event() {
        let (pipeline, db, _dir) = setup("http://unused.invalid").await;
        let outcome = pipeline
            .send_email(&request(&["ops@example.com"]))
            .await
            .unwrap();
        assert!(!outcome.sent);
        assert!(events::list_events(&db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_is_config_error_without_event() {
        let (pipeline, db, _dir) = setup("http://unused.invalid").await;
        pipeline
            .registry
            .update_module(ModuleSlug::Smtp2go, Some(true), Some(&json!({})))
            .await
            .unwrap();

        let err = pipeline
            .send_email(&request(&["ops@example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
        assert!(events::list_events(&db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn smtp2go_send_records_event_and_correlation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"succeeded": 1, "failed": 0, "email_id": "M1"}
            })))
            .mount(&server)
            .await;

        let (pipeline, db, _dir) = setup(&server.uri()).await;
        enable_smtp2go(&pipeline, json!({})).await;

        let outcome = pipeline
            .send_email(&request(&["ops@example.com"]))
            .await
            .unwrap();
        assert!(outcome.sent);
        let metadata = outcome.metadata.unwrap();
        assert_eq!(metadata["smtp2go_message_id"], "M1");

        let event = &events::list_events(&db, 10).await.unwrap()[0];
        assert_eq!(event.status, EventStatus::Succeeded);
        assert_eq!(event.name, "module.smtp2go.send_email");
        assert_eq!(
            event.correlation_ids.as_ref().unwrap()["smtp2go_message_id"],
            "M1"
        );
    }

    #[tokio::test]
    async fn provider_failure_records_failed_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let (pipeline, db, _dir) = setup(&server.uri()).await;
        enable_smtp2go(&pipeline, json!({})).await;

        assert!(pipeline.send_email(&request(&["ops@example.com"])).await.is_err());
        let event = &events::list_events(&db, 10).await.unwrap()[0];
        assert_eq!(event.status, EventStatus::Failed);
        assert!(event.last_error.as_ref().unwrap().contains("smtp2go"));
    }

    #[tokio::test]
    async fn tracking_persists_pair_without_sent_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"succeeded": 1, "failed": 0, "email_id": "M2"}
            })))
            .mount(&server)
            .await;

        let (pipeline, db, _dir) = setup(&server.uri()).await;
        enable_smtp2go(&pipeline, json!({"enable_tracking": true})).await;

        let created = tickets::create_ticket(&db, &NewTicket::new("Printer down"))
            .await
            .unwrap();
        let reply_id = replies::insert_reply(&db, created.ticket_id, None, "body", 0, false)
            .await
            .unwrap();

        let mut req = request(&["ops@example.com"]);
        req.ticket_reply_id = Some(reply_id);
        let outcome = pipeline.send_email(&req).await.unwrap();
        assert!(outcome.sent);

        let reply = replies::get_reply(&db, reply_id).await.unwrap().unwrap();
        assert_eq!(reply.smtp2go_message_id.as_deref(), Some("M2"));
        assert!(reply.email_tracking_id.is_some());
        // Stamped only by the later `processed` webhook.
        assert!(reply.email_sent_at.is_none());
    }

    #[tokio::test]
    async fn tracking_skipped_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"succeeded": 1, "failed": 0, "email_id": "M3"}
            })))
            .mount(&server)
            .await;

        let (pipeline, db, _dir) = setup(&server.uri()).await;
        enable_smtp2go(&pipeline, json!({"enable_tracking": false})).await;

        let created = tickets::create_ticket(&db, &NewTicket::new("Subject"))
            .await
            .unwrap();
        let reply_id = replies::insert_reply(&db, created.ticket_id, None, "body", 0, false)
            .await
            .unwrap();

        let mut req = request(&["ops@example.com"]);
        req.ticket_reply_id = Some(reply_id);
        pipeline.send_email(&req).await.unwrap();

        let reply = replies::get_reply(&db, reply_id).await.unwrap().unwrap();
        assert!(reply.email_tracking_id.is_none());
    }

    #[tokio::test]
    async fn relay_route_selected_when_smtp_host_configured() {
        let (pipeline, _db, _dir) = setup("http://unused.invalid").await;
        pipeline
            .registry
            .update_module(
                ModuleSlug::Smtp,
                Some(true),
                Some(&json!({"smtp_host": "mail.example.com"})),
            )
            .await
            .unwrap();

        assert!(matches!(
            pipeline.route().await.unwrap(),
            EmailRoute::Relay(_)
        ));
    }

    #[test]
    fn relay_sender_resolution_order() {
        let settings = json!({"from_address": "noreply@example.com", "smtp_user": "user@example.com"});
        assert_eq!(
            resolve_relay_sender(&settings, Some("arg@example.com")).unwrap(),
            "arg@example.com"
        );
        assert_eq!(
            resolve_relay_sender(&settings, None).unwrap(),
            "noreply@example.com"
        );
        let user_only = json!({"smtp_user": "user@example.com"});
        assert_eq!(
            resolve_relay_sender(&user_only, None).unwrap(),
            "user@example.com"
        );
        assert!(resolve_relay_sender(&json!({}), None).is_err());
    }
}
