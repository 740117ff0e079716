// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uptime Kuma alert rows.

use myportal_core::PortalError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_utc};
use crate::models::AlertRecord;

/// Parameters for inserting an alert. `received_at` is always stamped with
/// server time by the insert.
#[derive(Debug, Clone, Default)]
pub struct NewAlert {
    pub event_uuid: Option<String>,
    pub monitor_id: Option<i64>,
    pub monitor_name: Option<String>,
    pub status: Option<String>,
    pub previous_status: Option<String>,
    pub importance: bool,
    pub occurred_at: Option<String>,
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
    pub payload: serde_json::Value,
}

/// Insert an alert row. Returns the alert id.
pub async fn insert_alert(db: &Database, alert: &NewAlert) -> Result<i64, PortalError> {
    let alert = alert.clone();
    let received_at = now_utc();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO uptime_kuma_alerts
                     (event_uuid, monitor_id, monitor_name, status, previous_status,
                      importance, occurred_at, received_at, remote_addr, user_agent, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    alert.event_uuid,
                    alert.monitor_id,
                    alert.monitor_name,
                    alert.status,
                    alert.previous_status,
                    alert.importance,
                    alert.occurred_at,
                    received_at,
                    alert.remote_addr,
                    alert.user_agent,
                    alert.payload.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a single alert by id.
pub async fn get_alert(db: &Database, alert_id: i64) -> Result<Option<AlertRecord>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_uuid, monitor_id, monitor_name, status, previous_status,
                        importance, occurred_at, received_at, remote_addr, user_agent, payload
                 FROM uptime_kuma_alerts WHERE id = ?1",
            )?;
            match stmt.query_row(params![alert_id], map_alert_row) {
                Ok(alert) => Ok(Some(alert)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List the most recent alerts, newest first.
pub async fn list_alerts(db: &Database, limit: i64) -> Result<Vec<AlertRecord>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_uuid, monitor_id, monitor_name, status, previous_status,
                        importance, occurred_at, received_at, remote_addr, user_agent, payload
                 FROM uptime_kuma_alerts ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], map_alert_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

fn map_alert_row(row: &rusqlite::Row<'_>) -> Result<AlertRecord, rusqlite::Error> {
    let payload: String = row.get(11)?;
    Ok(AlertRecord {
        id: row.get(0)?,
        event_uuid: row.get(1)?,
        monitor_id: row.get(2)?,
        monitor_name: row.get(3)?,
        status: row.get(4)?,
        previous_status: row.get(5)?,
        importance: row.get(6)?,
        occurred_at: row.get(7)?,
        received_at: row.get(8)?,
        remote_addr: row.get(9)?,
        user_agent: row.get(10)?,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
    })
}
