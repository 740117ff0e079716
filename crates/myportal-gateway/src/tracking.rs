// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portal-hosted email tracking endpoints.
//!
//! The outbound pipeline injects a pixel pointing at `/t/open.gif` and
//! rewrites links through `/t/click`. Both endpoints record their event and
//! respond usefully even when the tracking id is unknown; a broken image or
//! dead link in a recipient's mail client is never acceptable.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use myportal_core::TrackingEventType;
use myportal_storage::database::now_utc;
use myportal_storage::queries::tracking::NewTrackingEvent;
use myportal_storage::queries::{replies, tracking};

use crate::server::AppState;

/// A 1x1 transparent GIF, served for every open-pixel request.
const PIXEL_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// GET /t/open.gif?tid=
pub async fn open_pixel(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(tid) = tracking_id(&query) {
        record(&state, &headers, tid, TrackingEventType::Open, None).await;
    }
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        Bytes::from_static(&PIXEL_GIF),
    )
        .into_response()
}

/// GET /t/click?tid=&url=
pub async fn click_redirect(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(target) = query.get("url").filter(|u| is_http_url(u)) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "missing or invalid url" })),
        )
            .into_response();
    };
    if let Some(tid) = tracking_id(&query) {
        record(
            &state,
            &headers,
            tid,
            TrackingEventType::Click,
            Some(target.clone()),
        )
        .await;
    }
    (
        StatusCode::FOUND,
        [(header::LOCATION, target.clone())],
    )
        .into_response()
}

fn tracking_id(query: &HashMap<String, String>) -> Option<&str> {
    query.get("tid").map(|t| t.trim()).filter(|t| !t.is_empty())
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Store the event row and apply it to the matching reply, if any. Failures
/// are logged, never surfaced; the recipient-facing response must not break.
async fn record(
    state: &AppState,
    headers: &HeaderMap,
    tid: &str,
    event_type: TrackingEventType,
    event_url: Option<String>,
) {
    let occurred_at = now_utc();
    let row = NewTrackingEvent {
        tracking_id: tid.to_string(),
        event_type,
        event_url: event_url.clone(),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string()),
        occurred_at: occurred_at.clone(),
        raw_payload: json!({ "source": "portal", "url": event_url }),
    };

    let first_sighting = match tracking::insert_tracking_event(&state.db, &row).await {
        Ok(changed) => changed,
        Err(err) => {
            tracing::error!(error = %err, tid, "failed to store tracking event");
            return;
        }
    };

    match replies::find_reply_by_tracking_id(&state.db, tid).await {
        Ok(Some(reply)) => {
            if let Err(err) = replies::apply_tracking_event(
                &state.db,
                reply.id,
                event_type,
                &occurred_at,
                first_sighting,
            )
            .await
            {
                tracing::error!(error = %err, reply_id = reply.id, "failed to apply tracking event");
            }
        }
        Ok(None) => {
            tracing::debug!(tid, event = %event_type, "tracking hit for unknown id");
        }
        Err(err) => {
            tracing::error!(error = %err, tid, "reply lookup failed");
        }
    }
}
