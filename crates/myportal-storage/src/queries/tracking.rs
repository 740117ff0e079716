// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email tracking event rows.
//!
//! Provider callbacks may be replayed; the unique index on
//! `(tracking_id, event_type, occurred_at)` makes the insert idempotent and
//! the return value tells the correlator whether this was a first sighting.

use myportal_core::{PortalError, TrackingEventType};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::EmailTrackingEvent;

/// Parameters for inserting a tracking event.
#[derive(Debug, Clone)]
pub struct NewTrackingEvent {
    pub tracking_id: String,
    pub event_type: TrackingEventType,
    pub event_url: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub occurred_at: String,
    pub raw_payload: serde_json::Value,
}

/// Insert a tracking event. Returns true when a new row was written and
/// false when the unique index identified a replay.
pub async fn insert_tracking_event(
    db: &Database,
    event: &NewTrackingEvent,
) -> Result<bool, PortalError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO email_tracking_events
                     (tracking_id, event_type, event_url, user_agent, ip, occurred_at, raw_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.tracking_id,
                    event.event_type.to_string(),
                    event.event_url,
                    event.user_agent,
                    event.ip,
                    event.occurred_at,
                    event.raw_payload.to_string(),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// List tracking events for a tracking id in occurrence order.
pub async fn list_tracking_events(
    db: &Database,
    tracking_id: &str,
) -> Result<Vec<EmailTrackingEvent>, PortalError> {
    let tracking_id = tracking_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tracking_id, event_type, event_url, user_agent, ip,
                        occurred_at, raw_payload, created_at
                 FROM email_tracking_events WHERE tracking_id = ?1
                 ORDER BY occurred_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![tracking_id], |row| {
                let event_type: String = row.get(2)?;
                let raw: String = row.get(7)?;
                Ok(EmailTrackingEvent {
                    id: row.get(0)?,
                    tracking_id: row.get(1)?,
                    event_type: event_type
                        .parse()
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    event_url: row.get(3)?,
                    user_agent: row.get(4)?,
                    ip: row.get(5)?,
                    occurred_at: row.get(6)?,
                    raw_payload: serde_json::from_str(&raw)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: row.get(8)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn delivered(tracking_id: &str, occurred_at: &str) -> NewTrackingEvent {
        NewTrackingEvent {
            tracking_id: tracking_id.into(),
            event_type: TrackingEventType::Delivered,
            event_url: None,
            user_agent: None,
            ip: None,
            occurred_at: occurred_at.into(),
            raw_payload: json!({"event": "delivered"}),
        }
    }

    #[tokio::test]
    async fn replayed_event_is_deduplicated() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let event = delivered("T1", "2025-01-01T12:00:00Z");
        assert!(insert_tracking_event(&db, &event).await.unwrap());
        assert!(!insert_tracking_event(&db, &event).await.unwrap());

        let events = list_tracking_events(&db, "T1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, TrackingEventType::Delivered);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn distinct_occurrences_both_stored() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(insert_tracking_event(&db, &delivered("T1", "2025-01-01T12:00:00Z"))
            .await
            .unwrap());
        assert!(insert_tracking_event(&db, &delivered("T1", "2025-01-01T12:30:00Z"))
            .await
            .unwrap());

        assert_eq!(list_tracking_events(&db, "T1").await.unwrap().len(), 2);
        db.close().await.unwrap();
    }
}
