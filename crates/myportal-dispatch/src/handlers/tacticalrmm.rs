// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tactical RMM API proxy handler.

use async_trait::async_trait;
use myportal_core::PortalError;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::warn;

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

pub struct TacticalRmmHandler {
    http: reqwest::Client,
}

impl TacticalRmmHandler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn client_for(&self, settings: &Value) -> Result<reqwest::Client, PortalError> {
        let verify_ssl = settings
            .get("verify_ssl")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if verify_ssl {
            return Ok(self.http.clone());
        }
        warn!("tacticalrmm certificate verification disabled by module settings");
        reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| PortalError::transport("failed to build HTTP client", e))
    }
}

fn target(settings: &Value, payload: &Value) -> String {
    format!(
        "{}/{}",
        setting_str(settings, "base_url").trim_end_matches('/'),
        payload_str(payload, "endpoint")
            .unwrap_or_default()
            .trim_start_matches('/')
    )
}

#[async_trait]
impl ModuleHandler for TacticalRmmHandler {
    fn verb(&self) -> &'static str {
        "request"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        if setting_str(settings, "base_url").is_empty() {
            return Err(PortalError::Config(
                "tacticalrmm module has no base_url configured".to_string(),
            ));
        }
        if payload_str(payload, "endpoint").is_none() {
            return Err(PortalError::Config("no endpoint in payload".to_string()));
        }
        if let Some(method) = payload_str(payload, "method")
            && method.to_ascii_uppercase().parse::<Method>().is_err()
        {
            return Err(PortalError::Config(format!("invalid HTTP method {method:?}")));
        }
        Ok(Prepared::single_attempt(Some(target(settings, payload))))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let method = payload_str(payload, "method")
            .map(|m| m.to_ascii_uppercase())
            .unwrap_or_else(|| "POST".to_string())
            .parse::<Method>()
            .map_err(|_| HandlerError::from(PortalError::Config("invalid HTTP method".to_string())))?;

        let client = self.client_for(settings)?;
        let mut request = client.request(method, target(settings, payload));
        let api_key = setting_str(settings, "api_key");
        if !api_key.is_empty() {
            request = request.header("Authorization", format!("Token {api_key}"));
        }
        if let Some(body) = payload.get("body") {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            HandlerError::from(PortalError::transport("tacticalrmm request failed", e))
        })?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(HandlerError::with_response(
                PortalError::Transport {
                    message: format!("tacticalrmm request failed with status {status}"),
                    source: None,
                },
                i64::from(status.as_u16()),
                text,
            ));
        }
        let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({"raw": text}));
        Ok(HandlerOutput::Success {
            response_status: Some(i64::from(status.as_u16())),
            response: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base: &str) -> Value {
        json!({"base_url": base, "api_key": "rmm-key", "verify_ssl": true})
    }

    #[test]
    fn invalid_method_fails_prepare() {
        let handler = TacticalRmmHandler::new(reqwest::Client::new());
        let err = handler
            .prepare(
                &settings("https://rmm.example.com"),
                &json!({"endpoint": "agents/", "method": "NOT A METHOD"}),
            )
            .unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[tokio::test]
    async fn method_from_payload_with_token_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents/"))
            .and(header("Authorization", "Token rmm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"agent_id": "a1"}])))
            .mount(&server)
            .await;

        let handler = TacticalRmmHandler::new(reqwest::Client::new());
        let output = handler
            .execute(
                &settings(&server.uri()),
                &json!({"endpoint": "/agents/", "method": "get"}),
            )
            .await
            .unwrap();
        match output {
            HandlerOutput::Success { response, .. } => assert_eq!(response[0]["agent_id"], "a1"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_method_is_post_with_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scripts/run/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let handler = TacticalRmmHandler::new(reqwest::Client::new());
        assert!(
            handler
                .execute(
                    &settings(&server.uri()),
                    &json!({"endpoint": "scripts/run/", "body": {"script": 9}}),
                )
                .await
                .is_ok()
        );
    }
}
