// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only API over webhook events.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use myportal_core::{AttemptRecord, EventStatus, WebhookEvent};
use myportal_storage::queries::events;

use crate::server::{AppState, error_response};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Wire shape of a webhook event. The payload snapshot and correlation ids
/// stay server-side; the list view is for operators scanning outcomes.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub status: EventStatus,
    pub attempt_count: i64,
    pub max_attempts: i64,
    pub target_url: Option<String>,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WebhookEvent> for EventView {
    fn from(event: WebhookEvent) -> Self {
        Self {
            id: event.id,
            name: event.name,
            slug: event.slug,
            status: event.status,
            attempt_count: event.attempt_count,
            max_attempts: event.max_attempts,
            target_url: event.target_url,
            response_status: event.response_status,
            response_body: event.response_body,
            last_error: event.last_error,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub attempt_number: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub response_status: Option<i64>,
    pub error_message: Option<String>,
}

impl From<AttemptRecord> for AttemptView {
    fn from(attempt: AttemptRecord) -> Self {
        Self {
            attempt_number: attempt.attempt_number,
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
            response_status: attempt.response_status,
            error_message: attempt.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: EventView,
    pub attempts: Vec<AttemptView>,
}

/// GET /api/webhook-events?limit=
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match events::list_events(&state.db, limit).await {
        Ok(rows) => Json(rows.into_iter().map(EventView::from).collect::<Vec<_>>()).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/webhook-events/{id}
pub async fn get_event(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let event = match events::get_event(&state.db, id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no such event" })),
            )
                .into_response();
        }
        Err(err) => return error_response(err),
    };
    match events::list_attempts(&state.db, id).await {
        Ok(attempts) => Json(EventDetail {
            event: event.into(),
            attempts: attempts.into_iter().map(AttemptView::from).collect(),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}
