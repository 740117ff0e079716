// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uptime Kuma alert intake.
//!
//! Auth is a shared token carried as a bearer header or `?token=` query
//! parameter, compared by SHA-256 digest against the stored hash. Plaintext
//! never touches the database. An empty stored hash means the operator has
//! not set a secret and alerts are accepted anonymously.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use myportal_modules::{ModuleSlug, sha256_hex};
use myportal_storage::queries::alerts::{self, NewAlert};

use crate::server::AppState;

/// POST /api/integration-modules/uptimekuma/alerts
pub async fn receive_alert(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (enabled, settings) = match state.registry.raw_settings(ModuleSlug::UptimeKuma).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "failed to load uptimekuma settings");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !enabled {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "module disabled" })),
        )
            .into_response();
    }

    let stored_hash = settings
        .get("shared_secret_hash")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !stored_hash.is_empty() {
        let presented = presented_token(&headers, &query);
        let authorized = presented
            .map(|token| sha256_hex(&token) == stored_hash)
            .unwrap_or(false);
        if !authorized {
            tracing::warn!("uptimekuma alert rejected: bad or missing token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed payload" })),
            )
                .into_response();
        }
    };

    let alert = NewAlert {
        event_uuid: event_uuid(&payload),
        monitor_id: payload.pointer("/monitor/id").and_then(Value::as_i64),
        monitor_name: payload
            .pointer("/monitor/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        status: heartbeat_status(&payload),
        previous_status: payload
            .get("previous_status")
            .and_then(Value::as_str)
            .map(str::to_string),
        importance: payload
            .pointer("/heartbeat/important")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        occurred_at: occurred_at(&payload),
        remote_addr: remote_addr(&headers),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        payload,
    };

    match alerts::insert_alert(&state.db, &alert).await {
        Ok(alert_id) => {
            tracing::info!(alert_id, monitor = ?alert.monitor_name, "stored uptimekuma alert");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "status": "stored", "alert_id": alert_id })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to store uptimekuma alert");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Token from `Authorization: Bearer ...` or the `?token=` query parameter.
fn presented_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    query
        .get("token")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// First non-empty external id the payload offers.
fn event_uuid(payload: &Value) -> Option<String> {
    for key in ["uuid", "incidentID", "incidentId", "id", "incident_id"] {
        if let Some(id) = payload.get(key) {
            let id = match id {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !id.is_empty() {
                return Some(id);
            }
        }
    }
    None
}

/// Heartbeat status, numeric codes mapped to their names.
fn heartbeat_status(payload: &Value) -> Option<String> {
    let status = payload
        .pointer("/heartbeat/status")
        .or_else(|| payload.get("status"))?;
    match status {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(
            match n.as_i64() {
                Some(0) => "down",
                Some(1) => "up",
                Some(2) => "pending",
                Some(3) => "maintenance",
                _ => return Some(n.to_string()),
            }
            .to_string(),
        ),
        _ => None,
    }
}

/// `payload.time` as ISO-8601 or epoch seconds; absent is fine, the insert
/// stamps `received_at` regardless.
fn occurred_at(payload: &Value) -> Option<String> {
    let time = payload
        .get("time")
        .or_else(|| payload.pointer("/heartbeat/time"))?;
    match time {
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
                return Some(
                    parsed
                        .with_timezone(&chrono::Utc)
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                );
            }
            if let Ok(naive) =
                chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
            {
                return Some(naive.format("%Y-%m-%dT%H:%M:%SZ").to_string());
            }
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        _ => None,
    }
}

fn remote_addr(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
