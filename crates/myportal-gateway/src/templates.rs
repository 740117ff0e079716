// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message template management and rendering API.
//!
//! Rendering merges three token sources, later layers winning: system
//! variables, flattened request context, and any flat `tokens` map supplied
//! verbatim.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use myportal_context::{flatten_context, system_variables};

use crate::server::{AppState, error_response};

/// Request body for PUT /api/message-templates/{slug}.
#[derive(Debug, Deserialize)]
pub struct TemplateUpsert {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_type: String,
    pub content: String,
}

/// Request body for POST /api/message-templates/{slug}/render.
#[derive(Debug, Deserialize, Default)]
pub struct RenderRequest {
    /// Nested context tree, flattened to `UPPER_SNAKE` tokens.
    #[serde(default)]
    pub context: Option<Value>,
    /// Flat token overrides applied on top.
    #[serde(default)]
    pub tokens: Option<std::collections::BTreeMap<String, String>>,
}

/// GET /api/message-templates
pub async fn list_templates(State(state): State<AppState>) -> Response {
    match state.templates.list().await {
        Ok(templates) => Json(templates).into_response(),
        Err(err) => error_response(err),
    }
}

/// PUT /api/message-templates/{slug}
pub async fn upsert_template(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<TemplateUpsert>,
) -> Response {
    match state
        .templates
        .upsert(
            &slug,
            &body.name,
            body.description.as_deref(),
            &body.content_type,
            &body.content,
        )
        .await
    {
        Ok(template) => Json(template).into_response(),
        Err(err) => error_response(err),
    }
}

/// DELETE /api/message-templates/{slug}
pub async fn delete_template(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.templates.delete(&slug).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => template_not_found(&slug),
        Err(err) => error_response(err),
    }
}

/// POST /api/message-templates/{slug}/render
pub async fn render_template(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<RenderRequest>,
) -> Response {
    let mut tokens = system_variables("MyPortal", &state.public_url);
    if let Some(context) = &body.context {
        tokens.extend(flatten_context(context));
    }
    if let Some(overrides) = body.tokens {
        tokens.extend(overrides);
    }

    match state.templates.render(&slug, &tokens).await {
        Ok(Some(rendered)) => Json(json!({ "slug": slug, "rendered": rendered })).into_response(),
        Ok(None) => template_not_found(&slug),
        Err(err) => error_response(err),
    }
}

fn template_not_found(slug: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no template `{slug}`") })),
    )
        .into_response()
}
