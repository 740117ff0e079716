// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event store: pending rows, attempt records, terminal transitions.
//!
//! Invariants enforced here:
//! - `attempt_number` values per event are dense and 1-based, assigned inside
//!   a transaction.
//! - terminal statuses (`succeeded`, `failed`, `skipped`) never transition
//!   back; a late write against a terminal event is a logged no-op.
//! - `response_body` is truncated before it hits the row.

use myportal_core::{EventStatus, NewWebhookEvent, PortalError};
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_utc};
use crate::models::{AttemptRecord, WebhookEvent};

/// Stored response bodies are capped at 4 KB.
pub const MAX_RESPONSE_BODY_BYTES: usize = 4096;

const EVENT_COLUMNS: &str = "id, name, slug, target_url, payload, status, attempt_count, \
     max_attempts, last_error, response_status, response_body, correlation_ids, \
     created_at, updated_at";

/// Truncate a response body to the storage cap on a char boundary.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_RESPONSE_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_RESPONSE_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

/// Insert a new event in `pending` status. Returns the event id.
pub async fn insert_event(db: &Database, event: &NewWebhookEvent) -> Result<i64, PortalError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO webhook_events (name, slug, target_url, payload, max_attempts, correlation_ids)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.name,
                    event.slug,
                    event.target_url,
                    event.payload.to_string(),
                    event.max_attempts,
                    event.correlation_ids.as_ref().map(|c| c.to_string()),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Start a new attempt for an event.
///
/// Atomically assigns the next dense `attempt_number`, inserts the attempt
/// row, and moves the event to `in_flight`. Fails if the event is already
/// terminal or the attempt budget is exhausted.
pub async fn begin_attempt(db: &Database, event_id: i64) -> Result<i64, PortalError> {
    let started_at = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let (status, max_attempts): (String, i64) = tx.query_row(
                "SELECT status, max_attempts FROM webhook_events WHERE id = ?1",
                params![event_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let status: EventStatus = status
                .parse()
                .map_err(|_| rusqlite::Error::InvalidQuery)?;
            if status.is_terminal() {
                // Surfaced by the caller as an internal error.
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }

            let attempt_number: i64 = tx.query_row(
                "SELECT COALESCE(MAX(attempt_number), 0) + 1 FROM webhook_attempts
                 WHERE event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )?;
            if attempt_number > max_attempts {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }

            tx.execute(
                "INSERT INTO webhook_attempts (event_id, attempt_number, started_at)
                 VALUES (?1, ?2, ?3)",
                params![event_id, attempt_number, started_at],
            )?;
            tx.execute(
                "UPDATE webhook_events SET status = 'in_flight', updated_at = ?2
                 WHERE id = ?1",
                params![event_id, started_at],
            )?;
            tx.commit()?;
            Ok(attempt_number)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(rusqlite::Error::QueryReturnedNoRows) => {
                PortalError::Internal(format!(
                    "event {event_id} is terminal or its attempt budget is exhausted"
                ))
            }
            other => map_tr_err(other),
        })
}

/// Record a successful attempt and move the event to `succeeded`.
pub async fn record_success(
    db: &Database,
    event_id: i64,
    attempt_number: i64,
    response_status: Option<i64>,
    response_body: Option<&str>,
) -> Result<(), PortalError> {
    let body = response_body.map(truncate_body);
    finish_attempt(
        db,
        event_id,
        attempt_number,
        EventStatus::Succeeded,
        None,
        response_status,
        body,
    )
    .await
}

/// Record a failed attempt.
///
/// The event goes to `failed` when the attempt budget is exhausted and back
/// to `pending` otherwise, so a retrying handler can pick it up again.
pub async fn record_failure(
    db: &Database,
    event_id: i64,
    attempt_number: i64,
    error_message: &str,
    response_status: Option<i64>,
    response_body: Option<&str>,
) -> Result<(), PortalError> {
    let body = response_body.map(truncate_body);
    finish_attempt(
        db,
        event_id,
        attempt_number,
        EventStatus::Failed,
        Some(error_message.to_string()),
        response_status,
        body,
    )
    .await
}

/// Record a skipped attempt: the handler ran but found nothing to do.
pub async fn record_skipped(
    db: &Database,
    event_id: i64,
    attempt_number: i64,
    reason: &str,
) -> Result<(), PortalError> {
    finish_attempt(
        db,
        event_id,
        attempt_number,
        EventStatus::Skipped,
        Some(reason.to_string()),
        None,
        None,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn finish_attempt(
    db: &Database,
    event_id: i64,
    attempt_number: i64,
    outcome: EventStatus,
    error_message: Option<String>,
    response_status: Option<i64>,
    response_body: Option<String>,
) -> Result<(), PortalError> {
    let finished_at = now_utc();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE webhook_attempts
                 SET finished_at = ?3, response_status = ?4, response_body = ?5,
                     error_message = ?6
                 WHERE event_id = ?1 AND attempt_number = ?2",
                params![
                    event_id,
                    attempt_number,
                    finished_at,
                    response_status,
                    response_body,
                    error_message,
                ],
            )?;

            let (max_attempts,): (i64,) = tx.query_row(
                "SELECT max_attempts FROM webhook_events WHERE id = ?1",
                params![event_id],
                |row| Ok((row.get(0)?,)),
            )?;
            let final_status = match outcome {
                EventStatus::Failed if attempt_number < max_attempts => EventStatus::Pending,
                other => other,
            };

            let changed = tx.execute(
                "UPDATE webhook_events
                 SET status = ?2, attempt_count = ?3, last_error = ?4,
                     response_status = ?5, response_body = ?6, updated_at = ?7
                 WHERE id = ?1
                   AND status NOT IN ('succeeded', 'failed', 'skipped')",
                params![
                    event_id,
                    final_status.to_string(),
                    attempt_number,
                    error_message,
                    response_status,
                    response_body,
                    finished_at,
                ],
            )?;
            if changed == 0 {
                tracing::warn!(event_id, "ignoring transition on terminal event");
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Merge correlation identifiers into the event's `correlation_ids` object.
pub async fn merge_correlation(
    db: &Database,
    event_id: i64,
    extra: serde_json::Value,
) -> Result<(), PortalError> {
    db.connection()
        .call(move |conn| {
            let existing: Option<String> = conn.query_row(
                "SELECT correlation_ids FROM webhook_events WHERE id = ?1",
                params![event_id],
                |row| row.get(0),
            )?;
            let mut merged = existing
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            if let Some(obj) = extra.as_object() {
                for (k, v) in obj {
                    merged.insert(k.clone(), v.clone());
                }
            }
            conn.execute(
                "UPDATE webhook_events SET correlation_ids = ?2 WHERE id = ?1",
                params![event_id, serde_json::Value::Object(merged).to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a single event by id.
pub async fn get_event(db: &Database, event_id: i64) -> Result<Option<WebhookEvent>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM webhook_events WHERE id = ?1"
            ))?;
            match stmt.query_row(params![event_id], map_event_row) {
                Ok(event) => Ok(Some(event)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List the most recent events, newest first.
pub async fn list_events(db: &Database, limit: i64) -> Result<Vec<WebhookEvent>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM webhook_events ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], map_event_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// List attempts for an event in attempt order.
pub async fn list_attempts(
    db: &Database,
    event_id: i64,
) -> Result<Vec<AttemptRecord>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_id, attempt_number, started_at, finished_at,
                        response_status, response_body, error_message
                 FROM webhook_attempts WHERE event_id = ?1
                 ORDER BY attempt_number ASC",
            )?;
            let rows = stmt.query_map(params![event_id], |row| {
                Ok(AttemptRecord {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    attempt_number: row.get(2)?,
                    started_at: row.get(3)?,
                    finished_at: row.get(4)?,
                    response_status: row.get(5)?,
                    response_body: row.get(6)?,
                    error_message: row.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<WebhookEvent, rusqlite::Error> {
    let payload: String = row.get(4)?;
    let status: String = row.get(5)?;
    let correlation: Option<String> = row.get(11)?;
    Ok(WebhookEvent {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        target_url: row.get(3)?,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        status: status.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        attempt_count: row.get(6)?,
        max_attempts: row.get(7)?,
        last_error: row.get(8)?,
        response_status: row.get(9)?,
        response_body: row.get(10)?,
        correlation_ids: correlation.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
