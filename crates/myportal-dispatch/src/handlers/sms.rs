// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS gateway handler (android-sms-gateway wire format).

use std::time::Duration;

use async_trait::async_trait;
use myportal_core::PortalError;
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

const SMS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SmsGatewayHandler {
    http: reqwest::Client,
}

impl SmsGatewayHandler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn phone_numbers(payload: &Value) -> Vec<String> {
    match payload.get("phoneNumbers").or_else(|| payload.get("phone_numbers")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[async_trait]
impl ModuleHandler for SmsGatewayHandler {
    fn verb(&self) -> &'static str {
        "send"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        let gateway_url = setting_str(settings, "gateway_url");
        if gateway_url.is_empty() {
            return Err(PortalError::Config(
                "sms-gateway module has no gateway_url configured".to_string(),
            ));
        }
        if setting_str(settings, "authorization").is_empty() {
            return Err(PortalError::Config(
                "sms-gateway module has no authorization configured".to_string(),
            ));
        }
        if payload_str(payload, "text").is_none() {
            return Err(PortalError::Config("no message text".to_string()));
        }
        if phone_numbers(payload).is_empty() {
            return Err(PortalError::Config("no phone numbers".to_string()));
        }
        Ok(Prepared::single_attempt(Some(gateway_url.to_string())))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let text = payload_str(payload, "text")
            .ok_or_else(|| HandlerError::from(PortalError::Config("no message text".to_string())))?;
        let mut body = json!({
            "textMessage": {"text": text},
            "phoneNumbers": phone_numbers(payload),
        });
        if let Some(map) = body.as_object_mut() {
            for key in ["simNumber", "ttl", "priority"] {
                if let Some(value) = payload.get(key) {
                    map.insert(key.to_string(), value.clone());
                }
            }
        }

        let response = self
            .http
            .post(setting_str(settings, "gateway_url"))
            .header("Authorization", setting_str(settings, "authorization"))
            .timeout(SMS_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                HandlerError::from(PortalError::transport("sms gateway request failed", e))
            })?;

        let status = response.status();
        let text_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(HandlerError::with_response(
                PortalError::Transport {
                    message: format!("sms gateway send failed with status {status}"),
                    source: None,
                },
                i64::from(status.as_u16()),
                text_body,
            ));
        }
        let response_json: Value =
            serde_json::from_str(&text_body).unwrap_or_else(|_| json!({"raw": text_body}));
        Ok(HandlerOutput::Success {
            response_status: Some(i64::from(status.as_u16())),
            response: response_json,
        })
    }
}
