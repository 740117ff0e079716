// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the SMTP2Go send API.
//!
//! Handles request construction, response envelope unwrapping, message-id
//! extraction, and success classification.

use std::time::Duration;

use myportal_core::PortalError;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Base URL for the SMTP2Go v3 API.
const API_BASE_URL: &str = "https://api.smtp2go.com/v3";

/// Response fields tried, in order, when extracting the provider message id.
const MESSAGE_ID_FIELDS: &[&str] = &[
    "smtp2go_message_id",
    "email_id",
    "message_id",
    "messageid",
    "request_id",
];

/// JSON body for `POST /email/send`.
#[derive(Debug, Serialize)]
pub struct Smtp2goSend {
    pub api_key: String,
    pub to: Vec<String>,
    pub sender: String,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<Value>,
}

/// Normalized outcome of a send call.
#[derive(Debug)]
pub struct ProviderDelivery {
    /// Provider message id, populated into both `email_id` and
    /// `smtp2go_message_id` metadata keys downstream.
    pub message_id: Option<String>,
    pub response_status: u16,
    pub response_body: Value,
}

/// Client for SMTP2Go API communication.
#[derive(Debug, Clone)]
pub struct Smtp2goClient {
    client: reqwest::Client,
    base_url: String,
}

impl Smtp2goClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, PortalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| PortalError::transport("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Send an email through the API and normalize the response.
    ///
    /// An HTTP 400 is surfaced with the full response body so an operator
    /// can see the provider's validation complaint. Other non-success
    /// classifications report the provider error summary.
    pub async fn send(&self, body: &Smtp2goSend) -> Result<ProviderDelivery, PortalError> {
        let url = format!("{}/email/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PortalError::transport("smtp2go request failed", e))?;

        let status = response.status();
        let raw: Value = response
            .json()
            .await
            .map_err(|e| PortalError::transport("smtp2go response was not JSON", e))?;

        // Newer API responses wrap payload fields in a `data` envelope.
        let data = raw.get("data").unwrap_or(&raw);

        if status.as_u16() == 400 {
            return Err(PortalError::EmailDispatch {
                message: format!("smtp2go rejected the send request: {raw}"),
                source: None,
            });
        }
        if !status.is_success() || !classify_success(data) {
            warn!(status = status.as_u16(), body = %raw, "smtp2go send not accepted");
            return Err(PortalError::EmailDispatch {
                message: format!("smtp2go send failed with status {status}: {}", error_summary(data)),
                source: None,
            });
        }

        let message_id = extract_message_id(data);
        debug!(message_id = message_id.as_deref(), "smtp2go send accepted");
        Ok(ProviderDelivery {
            message_id,
            response_status: status.as_u16(),
            response_body: raw,
        })
    }
}

/// A 2xx response still fails when the payload carries an error marker.
fn classify_success(data: &Value) -> bool {
    if data.get("error").is_some() {
        return false;
    }
    if data
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errs| !errs.is_empty())
    {
        return false;
    }
    if data.get("failed").and_then(Value::as_i64).unwrap_or(0) != 0 {
        return false;
    }
    if let Some(result) = data.get("result").and_then(Value::as_str)
        && !result.eq_ignore_ascii_case("success")
    {
        return false;
    }
    true
}

fn extract_message_id(data: &Value) -> Option<String> {
    MESSAGE_ID_FIELDS
        .iter()
        .filter_map(|field| data.get(field).and_then(Value::as_str))
        .find(|id| !id.is_empty())
        .map(String::from)
}

fn error_summary(data: &Value) -> String {
    data.get("error")
        .or_else(|| data.get("errors"))
        .map(Value::to_string)
        .unwrap_or_else(|| "provider reported failure".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: String) -> Smtp2goClient {
        Smtp2goClient::new(Duration::from_secs(5), Duration::from_secs(2))
            .unwrap()
            .with_base_url(base)
    }

    fn send_body() -> Smtp2goSend {
        Smtp2goSend {
            api_key: "api-TEST".to_string(),
            to: vec!["ops@example.com".to_string()],
            sender: "portal@example.com".to_string(),
            subject: "Test".to_string(),
            html_body: "<p>hi</p>".to_string(),
            text_body: None,
            custom_headers: None,
        }
    }

    #[tokio::test]
    async fn unwraps_data_envelope_and_extracts_email_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .and(body_partial_json(json!({"api_key": "api-TEST"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"succeeded": 1, "failed": 0, "email_id": "1a2b3c"}
            })))
            .mount(&server)
            .await;

        let delivery = client(server.uri()).send(&send_body()).await.unwrap();
        assert_eq!(delivery.message_id.as_deref(), Some("1a2b3c"));
        assert_eq!(delivery.response_status, 200);
    }

    #[tokio::test]
    async fn message_id_field_priority() {
        let data = json!({
            "request_id": "req-1",
            "message_id": "msg-1",
            "smtp2go_message_id": "s2g-1"
        });
        assert_eq!(extract_message_id(&data).as_deref(), Some("s2g-1"));

        let data = json!({"smtp2go_message_id": "", "email_id": "e-1"});
        assert_eq!(extract_message_id(&data).as_deref(), Some("e-1"));

        assert_eq!(extract_message_id(&json!({})), None);
    }

    #[tokio::test]
    async fn two_hundred_with_failures_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"succeeded": 0, "failed": 1, "errors": ["bad recipient"]}
            })))
            .mount(&server)
            .await;

        let err = client(server.uri()).send(&send_body()).await.unwrap_err();
        assert!(matches!(err, PortalError::EmailDispatch { .. }));
    }

    #[tokio::test]
    async fn four_hundred_surfaces_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email/send"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "data": {"error": "E_ApiResponseCodes.NON_VALIDATING_IN_PAYLOAD"}
            })))
            .mount(&server)
            .await;

        let err = client(server.uri()).send(&send_body()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NON_VALIDATING_IN_PAYLOAD"), "{message}");
    }

    #[tokio::test]
    async fn non_success_result_string_is_an_error() {
        assert!(!classify_success(&json!({"result": "failure"})));
        assert!(classify_success(&json!({"result": "Success"})));
        assert!(classify_success(&json!({"succeeded": 1})));
    }
}
