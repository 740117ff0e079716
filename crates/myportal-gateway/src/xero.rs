// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Xero callback probe and tenant listing.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use myportal_core::PortalError;
use myportal_modules::ModuleSlug;
use myportal_xero::oauth::RefreshCredentials;

use crate::server::{AppState, error_response};

/// POST /api/integration-modules/xero/callback
///
/// Xero does not sign this probe; the body may be empty. Headers and payload
/// keys are logged for the operator wiring up the connection, then the
/// request is acknowledged.
pub async fn callback(headers: HeaderMap, body: Bytes) -> Response {
    let xero_headers: Vec<String> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-xero-"))
        .map(|(name, value)| format!("{}={}", name, value.to_str().unwrap_or("<binary>")))
        .collect();

    let payload_keys: Vec<String> = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.as_object()
                .map(|obj| obj.keys().cloned().collect::<Vec<_>>())
        })
        .unwrap_or_default();

    tracing::info!(
        headers = ?xero_headers,
        payload_keys = ?payload_keys,
        body_len = body.len(),
        "xero callback received"
    );

    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response()
}

/// GET /api/integration-modules/xero/callback — connectivity probe.
pub async fn callback_probe(Query(query): Query<HashMap<String, String>>) -> Response {
    tracing::debug!(params = ?query.keys().collect::<Vec<_>>(), "xero callback probe");
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// GET /api/integration-modules/xero/tenants
///
/// Exchanges the stored refresh token for an access token and lists the
/// tenants it can act on, so the operator can pick a `tenant_id`.
pub async fn list_tenants(State(state): State<AppState>) -> Response {
    match tenants(&state).await {
        Ok(tenants) => Json(tenants).into_response(),
        Err(err) => error_response(err),
    }
}

async fn tenants(state: &AppState) -> Result<Vec<myportal_xero::Tenant>, PortalError> {
    let (_, settings) = state.registry.raw_settings(ModuleSlug::Xero).await?;
    let credentials = RefreshCredentials {
        client_id: require(&settings, "client_id")?,
        client_secret: require(&settings, "client_secret")?,
        refresh_token: require(&settings, "refresh_token")?,
    };
    let token = state
        .xero_tokens
        .access_token("connections", &credentials)
        .await?;
    state.xero.connections(&token).await
}

fn require(settings: &Value, key: &str) -> Result<String, PortalError> {
    settings
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PortalError::Config(format!("xero module is missing `{key}`")))
}
