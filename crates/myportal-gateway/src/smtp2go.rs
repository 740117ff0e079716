// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP2Go delivery event correlator.
//!
//! The provider retries on non-2xx, so after authentication this endpoint
//! always answers 200 with a processed/failed tally; a malformed or unknown
//! event is accepted and discarded rather than NACKed. Reply columns are
//! updated with COALESCE semantics so replayed and out-of-order deliveries
//! converge on the same final state.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use myportal_core::TrackingEventType;
use myportal_modules::ModuleSlug;
use myportal_storage::database::now_utc;
use myportal_storage::queries::tracking::NewTrackingEvent;
use myportal_storage::queries::{replies, tracking};

use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-smtp2go-signature";

/// Response body for the event endpoint.
#[derive(Debug, Serialize)]
pub struct EventReceipt {
    pub status: String,
    pub processed: u32,
    pub failed: u32,
}

impl EventReceipt {
    fn ok(processed: u32) -> Self {
        Self {
            status: "ok".into(),
            processed,
            failed: 0,
        }
    }

    fn failed() -> Self {
        Self {
            status: "error".into(),
            processed: 0,
            failed: 1,
        }
    }
}

/// POST /api/webhooks/smtp2go/events
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Signature check runs over the raw body, before any parsing. A failure
    // is the one case that refuses the delivery; no event row is written.
    match state.registry.raw_settings(ModuleSlug::Smtp2go).await {
        Ok((_, settings)) => {
            let secret = settings
                .get("webhook_secret")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !secret.is_empty() && !signature_matches(secret, &headers, &body) {
                tracing::warn!("smtp2go webhook signature mismatch");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to load smtp2go settings");
            return (StatusCode::OK, Json(EventReceipt::failed())).into_response();
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "smtp2go webhook carried malformed JSON");
            return (StatusCode::OK, Json(EventReceipt::failed())).into_response();
        }
    };

    match correlate(&state, payload).await {
        Ok(processed) => (StatusCode::OK, Json(EventReceipt::ok(processed))).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "smtp2go event processing failed");
            (StatusCode::OK, Json(EventReceipt::failed())).into_response()
        }
    }
}

/// Process a single provider event. Returns the number of events applied
/// (0 when the event type is unknown and discarded).
async fn correlate(state: &AppState, payload: Value) -> Result<u32, myportal_core::PortalError> {
    let event_name = payload
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(event_type) = TrackingEventType::from_provider(event_name) else {
        tracing::info!(event = event_name, "discarding unknown smtp2go event type");
        return Ok(0);
    };

    let message_id = provider_message_id(&payload);
    let occurred_at = normalize_timestamp(payload.get("timestamp").and_then(Value::as_str));

    let reply = match message_id.as_deref() {
        Some(id) => replies::find_reply_by_message_id(&state.db, id).await?,
        None => None,
    };

    // An event for a reply this portal never sent is still recorded, keyed
    // by the provider id, so delivery history is not lost.
    let tracking_id = reply
        .as_ref()
        .and_then(|r| r.email_tracking_id.clone())
        .or_else(|| message_id.clone());
    let Some(tracking_id) = tracking_id else {
        tracing::warn!(event = event_name, "smtp2go event carried no message id");
        return Ok(0);
    };

    let row = NewTrackingEvent {
        tracking_id,
        event_type,
        event_url: payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string),
        user_agent: payload
            .get("useragent")
            .or_else(|| payload.get("user_agent"))
            .and_then(Value::as_str)
            .map(str::to_string),
        ip: payload
            .get("ip")
            .and_then(Value::as_str)
            .map(str::to_string),
        occurred_at: occurred_at.clone(),
        raw_payload: payload,
    };
    let first_sighting = tracking::insert_tracking_event(&state.db, &row).await?;

    if let Some(reply) = reply {
        replies::apply_tracking_event(&state.db, reply.id, event_type, &occurred_at, first_sighting)
            .await?;
        tracing::debug!(
            reply_id = reply.id,
            event = %event_type,
            replay = !first_sighting,
            "applied smtp2go event to reply"
        );
    } else {
        tracing::debug!(event = %event_type, "stored orphan smtp2go event");
    }

    Ok(1)
}

/// Constant-time HMAC-SHA-256 check of the raw body against the hex
/// signature header.
fn signature_matches(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Provider message id: `email_id` first, `Message-Id` as the fallback.
fn provider_message_id(payload: &Value) -> Option<String> {
    for key in ["email_id", "Message-Id", "message_id"] {
        if let Some(id) = payload.get(key).and_then(Value::as_str) {
            let id = id.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Parse the provider timestamp as ISO-8601, normalizing the offset to a
/// trailing `Z`. Unparseable or absent timestamps fall back to server time.
fn normalize_timestamp(raw: Option<&str>) -> String {
    if let Some(raw) = raw {
        let trimmed = raw.trim();
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
            return parsed
                .with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        }
        if let Ok(naive) =
            chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        {
            return naive.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        }
    }
    now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_normalizes_offset_to_zulu() {
        assert_eq!(
            normalize_timestamp(Some("2025-01-01T12:00:00+00:00")),
            "2025-01-01T12:00:00Z"
        );
        assert_eq!(
            normalize_timestamp(Some("2025-01-01T12:00:00Z")),
            "2025-01-01T12:00:00Z"
        );
        assert_eq!(
            normalize_timestamp(Some("2025-01-01 12:00:00")),
            "2025-01-01T12:00:00Z"
        );
    }

    #[test]
    fn timestamp_falls_back_to_now_on_garbage() {
        let ts = normalize_timestamp(Some("not a time"));
        assert!(ts.ends_with('Z'));
        let ts = normalize_timestamp(None);
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn message_id_prefers_email_id() {
        let payload = serde_json::json!({"email_id": "E1", "Message-Id": "M1"});
        assert_eq!(provider_message_id(&payload).as_deref(), Some("E1"));
        let payload = serde_json::json!({"email_id": "", "Message-Id": "M1"});
        assert_eq!(provider_message_id(&payload).as_deref(), Some("M1"));
        assert_eq!(provider_message_id(&serde_json::json!({})), None);
    }

    #[test]
    fn signature_check_is_exact() {
        use hmac::Mac;
        let body = br#"{"event":"open"}"#;
        let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
        mac.update(body);
        let good = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, good.parse().unwrap());
        assert!(signature_matches("s3cret", &headers, body));
        assert!(!signature_matches("other", &headers, body));

        headers.insert(SIGNATURE_HEADER, "deadbeef".parse().unwrap());
        assert!(!signature_matches("s3cret", &headers, body));

        let empty = HeaderMap::new();
        assert!(!signature_matches("s3cret", &empty, body));
    }
}
