// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `smtp` and `smtp2go` handlers, both delegating to the email pipeline.

use async_trait::async_trait;
use myportal_core::PortalError;
use myportal_email::pipeline::{
    self, EmailPipeline, EmailRequest, normalize_recipients,
};
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

/// Merge explicit payload recipients with the module's default list.
fn merged_recipients(payload: &Value, settings: &Value) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    if let Some(items) = payload.get("recipients").and_then(Value::as_array) {
        recipients.extend(items.iter().filter_map(Value::as_str).map(String::from));
    } else if let Some(single) = payload_str(payload, "recipients") {
        recipients.extend(single.split(',').map(String::from));
    }
    if let Some(defaults) = settings.get("default_recipients").and_then(Value::as_array) {
        recipients.extend(defaults.iter().filter_map(Value::as_str).map(String::from));
    }
    normalize_recipients(&recipients)
}

/// Legacy `html`/`text` keys win over the newer `html_body`/`text_body`.
fn body_fields(payload: &Value) -> (String, Option<String>) {
    let html = payload_str(payload, "html")
        .or_else(|| payload_str(payload, "html_body"))
        .unwrap_or_default();
    let text = payload_str(payload, "text").or_else(|| payload_str(payload, "text_body"));
    (html, text)
}

/// Tracking applicability: explicit payload field, then payload metadata,
/// then the flattened context's latest reply.
fn resolve_ticket_reply_id(payload: &Value) -> Option<i64> {
    read_i64(payload.get("ticket_reply_id"))
        .or_else(|| read_i64(payload.pointer("/metadata/ticket_reply_id")))
        .or_else(|| read_i64(payload.pointer("/context/ticket/latest_reply/id")))
}

fn read_i64(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn build_request(payload: &Value, settings: &Value, subject_prefix: &str) -> EmailRequest {
    let (html_body, text_body) = body_fields(payload);
    let subject = payload_str(payload, "subject").unwrap_or_default();
    EmailRequest {
        subject: if subject_prefix.is_empty() {
            subject
        } else {
            format!("{subject_prefix}{subject}")
        },
        recipients: merged_recipients(payload, settings),
        html_body,
        text_body,
        sender: payload_str(payload, "sender").or_else(|| payload_str(payload, "from")),
        reply_to: payload_str(payload, "reply_to"),
        ticket_reply_id: resolve_ticket_reply_id(payload),
    }
}

pub struct SmtpHandler {
    pipeline: EmailPipeline,
}

impl SmtpHandler {
    pub fn new(pipeline: EmailPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ModuleHandler for SmtpHandler {
    fn verb(&self) -> &'static str {
        "send_email"
    }

    fn prepare(&self, settings: &Value, _payload: &Value) -> Result<Prepared, PortalError> {
        let config = pipeline::relay_config_from_settings(settings)?;
        Ok(Prepared::single_attempt(Some(format!(
            "smtp://{}:{}",
            config.host, config.port
        ))))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let request = build_request(payload, settings, setting_str(settings, "subject_prefix"));
        if request.recipients.is_empty() {
            return Ok(HandlerOutput::Skipped {
                reason: "no recipients after merging payload and defaults".to_string(),
            });
        }
        self.pipeline.deliver_relay(&request, settings).await?;
        Ok(HandlerOutput::Success {
            response_status: None,
            response: json!({"sent": true, "recipients": request.recipients.len()}),
        })
    }
}

pub struct Smtp2goHandler {
    pipeline: EmailPipeline,
}

impl Smtp2goHandler {
    pub fn new(pipeline: EmailPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ModuleHandler for Smtp2goHandler {
    fn verb(&self) -> &'static str {
        "send_email"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        pipeline::smtp2go_send_config(settings, payload_str(payload, "sender").as_deref())?;
        Ok(Prepared::single_attempt(Some(
            "https://api.smtp2go.com/v3/email/send".to_string(),
        )))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let request = build_request(payload, settings, "");
        if request.recipients.is_empty() {
            return Ok(HandlerOutput::Skipped {
                reason: "no recipients in payload".to_string(),
            });
        }
        let report = self.pipeline.deliver_smtp2go(&request, settings).await?;
        Ok(HandlerOutput::Success {
            response_status: Some(i64::from(report.response_status)),
            response: json!({
                "sent": true,
                "email_id": report.message_id,
                "smtp2go_message_id": report.message_id,
                "tracking_id": report.tracking_id,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_recipients_come_before_defaults() {
        let recipients = merged_recipients(
            &json!({"recipients": ["a@b.example"]}),
            &json!({"default_recipients": ["c@d.example", "a@b.example"]}),
        );
        assert_eq!(recipients, vec!["a@b.example", "c@d.example"]);
    }

    #[test]
    fn comma_separated_recipient_string_accepted() {
        let recipients = merged_recipients(
            &json!({"recipients": "a@b.example, c@d.example"}),
            &json!({}),
        );
        assert_eq!(recipients, vec!["a@b.example", "c@d.example"]);
    }

    #[test]
    fn legacy_body_keys_win() {
        let (html, text) = body_fields(&json!({
            "html": "<p>legacy</p>", "html_body": "<p>new</p>",
            "text": "legacy", "text_body": "new"
        }));
        assert_eq!(html, "<p>legacy</p>");
        assert_eq!(text.as_deref(), Some("legacy"));

        let (html, text) = body_fields(&json!({"html_body": "<p>new</p>"}));
        assert_eq!(html, "<p>new</p>");
        assert!(text.is_none());
    }

    #[test]
    fn ticket_reply_id_resolution_order() {
        // Explicit argument wins over metadata and context.
        let payload = json!({
            "ticket_reply_id": "42",
            "metadata": {"ticket_reply_id": 7},
            "context": {"ticket": {"latest_reply": {"id": 9}}}
        });
        assert_eq!(resolve_ticket_reply_id(&payload), Some(42));

        let payload = json!({"metadata": {"ticket_reply_id": 7}});
        assert_eq!(resolve_ticket_reply_id(&payload), Some(7));

        let payload = json!({"context": {"ticket": {"latest_reply": {"id": 9}}}});
        assert_eq!(resolve_ticket_reply_id(&payload), Some(9));

        assert_eq!(resolve_ticket_reply_id(&json!({})), None);
    }

    #[test]
    fn subject_prefix_applied() {
        let request = build_request(
            &json!({"subject": "Down", "recipients": ["a@b.example"], "html": "<p>x</p>"}),
            &json!({}),
            "[MyPortal] ",
        );
        assert_eq!(request.subject, "[MyPortal] Down");
    }
}
