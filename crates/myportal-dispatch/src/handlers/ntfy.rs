// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ntfy push-notification handler.

use async_trait::async_trait;
use myportal_core::PortalError;
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

pub struct NtfyHandler {
    http: reqwest::Client,
}

impl NtfyHandler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn resolve_message(payload: &Value) -> Option<String> {
    payload_str(payload, "message")
        .or_else(|| payload_str(payload, "text"))
        .or_else(|| payload_str(payload, "body"))
}

fn target(settings: &Value) -> String {
    format!(
        "{}/{}",
        setting_str(settings, "base_url").trim_end_matches('/'),
        setting_str(settings, "topic")
    )
}

#[async_trait]
impl ModuleHandler for NtfyHandler {
    fn verb(&self) -> &'static str {
        "send"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        if setting_str(settings, "topic").is_empty() {
            return Err(PortalError::Config(
                "ntfy module has no topic configured".to_string(),
            ));
        }
        if resolve_message(payload).is_none() {
            return Err(PortalError::Config(
                "no message: set payload.message, payload.text, or payload.body".to_string(),
            ));
        }
        Ok(Prepared::single_attempt(Some(target(settings))))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let message = resolve_message(payload)
            .ok_or_else(|| HandlerError::from(PortalError::Config("no message".to_string())))?;

        let mut request = self.http.post(target(settings)).body(message.into_bytes());
        if let Some(title) = payload_str(payload, "title") {
            request = request.header("Title", title);
        }
        if let Some(priority) = payload_str(payload, "priority") {
            request = request.header("Priority", priority);
        }
        let token = setting_str(settings, "auth_token");
        if !token.is_empty() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::from(PortalError::transport("ntfy request failed", e)))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(HandlerError::with_response(
                PortalError::Transport {
                    message: format!("ntfy publish failed with status {status}"),
                    source: None,
                },
                i64::from(status.as_u16()),
                body,
            ));
        }
        Ok(HandlerOutput::Success {
            response_status: Some(i64::from(status.as_u16())),
            response: json!({"published": true}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base: &str, token: &str) -> Value {
        json!({"base_url": base, "topic": "ops", "auth_token": token})
    }

    #[test]
    fn missing_topic_fails_prepare() {
        let handler = NtfyHandler::new(reqwest::Client::new());
        let err = handler
            .prepare(
                &json!({"base_url": "https://ntfy.sh", "topic": "", "auth_token": ""}),
                &json!({"message": "x"}),
            )
            .unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[tokio::test]
    async fn publishes_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ops"))
            .and(body_string("disk almost full"))
            .and(header("Title", "Alert"))
            .and(header("Priority", "5"))
            .and(header("Authorization", "Bearer tk-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m1"})))
            .mount(&server)
            .await;

        let handler = NtfyHandler::new(reqwest::Client::new());
        let output = handler
            .execute(
                &settings(&server.uri(), "tk-1"),
                &json!({"message": "disk almost full", "title": "Alert", "priority": 5}),
            )
            .await
            .unwrap();
        assert!(matches!(output, HandlerOutput::Success { .. }));
    }

    #[tokio::test]
    async fn server_error_carries_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ops"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
            .mount(&server)
            .await;

        let handler = NtfyHandler::new(reqwest::Client::new());
        let err = handler
            .execute(&settings(&server.uri(), ""), &json!({"message": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.response_status, Some(429));
        assert_eq!(err.response_body.as_deref(), Some("too many requests"));
    }
}
