// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration module management API.
//!
//! Settings leave the server redacted; secret fields are write-only and the
//! redaction sentinel in a PATCH means "keep what is stored".

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use myportal_modules::ModuleSlug;

use crate::server::{AppState, error_response};

/// Request body for PATCH /api/integration-modules/{slug}.
#[derive(Debug, Deserialize)]
pub struct ModuleUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub settings: Option<Value>,
}

/// Request body for POST /api/integration-modules/{slug}/trigger.
#[derive(Debug, Deserialize, Default)]
pub struct TriggerRequest {
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub background: bool,
}

/// GET /api/integration-modules
pub async fn list_modules(State(state): State<AppState>) -> Response {
    match state.registry.list_modules().await {
        Ok(modules) => Json(modules).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/integration-modules/{slug}
pub async fn get_module(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let slug = match parse_slug(&slug) {
        Ok(slug) => slug,
        Err(response) => return response,
    };
    match state.registry.get_module(slug).await {
        Ok(Some(module)) => Json(module).into_response(),
        Ok(None) => not_configured(slug),
        Err(err) => error_response(err),
    }
}

/// PATCH /api/integration-modules/{slug}
pub async fn update_module(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(update): Json<ModuleUpdate>,
) -> Response {
    let slug = match parse_slug(&slug) {
        Ok(slug) => slug,
        Err(response) => return response,
    };
    match state
        .registry
        .update_module(slug, update.enabled, update.settings.as_ref())
        .await
    {
        Ok(module) => Json(module).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /api/integration-modules/{slug}/trigger
pub async fn trigger_module(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<TriggerRequest>,
) -> Response {
    let payload = request.payload.unwrap_or_else(|| json!({}));
    match state
        .dispatcher
        .trigger_module(&slug, payload, request.background, None)
        .await
    {
        Ok(outcome) => {
            let status = if request.background {
                StatusCode::ACCEPTED
            } else {
                StatusCode::OK
            };
            (status, Json(outcome)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn parse_slug(raw: &str) -> Result<ModuleSlug, Response> {
    ModuleSlug::from_str(raw).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown module `{raw}`") })),
        )
            .into_response()
    })
}

fn not_configured(slug: ModuleSlug) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("module `{slug}` is not configured") })),
    )
        .into_response()
}
