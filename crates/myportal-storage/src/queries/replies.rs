// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket-reply tracking columns.
//!
//! The ticketing subsystem owns `ticket_replies`; the integration core only
//! reads and writes the email tracking columns. Timestamp columns are set at
//! most once via `COALESCE(existing, new)`, so out-of-order webhook arrival
//! converges to the same final state. `email_open_count` only ever grows.

use myportal_core::{PortalError, TrackingEventType};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::TicketReply;

const REPLY_COLUMNS: &str = "id, ticket_id, author_id, body, minutes_spent, is_billable, \
     email_tracking_id, smtp2go_message_id, email_sent_at, email_processed_at, \
     email_delivered_at, email_opened_at, email_bounced_at, email_rejected_at, \
     email_open_count";

/// Insert a reply row. Used by the create-ticket handler and tests; the full
/// reply lifecycle belongs to the ticketing collaborator.
pub async fn insert_reply(
    db: &Database,
    ticket_id: i64,
    author_id: Option<i64>,
    body: &str,
    minutes_spent: i64,
    is_billable: bool,
) -> Result<i64, PortalError> {
    let body = body.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO ticket_replies (ticket_id, author_id, body, minutes_spent, is_billable)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![ticket_id, author_id, body, minutes_spent, is_billable],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a reply by id.
pub async fn get_reply(db: &Database, reply_id: i64) -> Result<Option<TicketReply>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLUMNS} FROM ticket_replies WHERE id = ?1"
            ))?;
            match stmt.query_row(params![reply_id], map_reply_row) {
                Ok(reply) => Ok(Some(reply)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Find the reply correlated with a provider message id.
pub async fn find_reply_by_message_id(
    db: &Database,
    message_id: &str,
) -> Result<Option<TicketReply>, PortalError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLUMNS} FROM ticket_replies WHERE smtp2go_message_id = ?1"
            ))?;
            match stmt.query_row(params![message_id], map_reply_row) {
                Ok(reply) => Ok(Some(reply)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Find the reply correlated with a tracking id.
pub async fn find_reply_by_tracking_id(
    db: &Database,
    tracking_id: &str,
) -> Result<Option<TicketReply>, PortalError> {
    let tracking_id = tracking_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLUMNS} FROM ticket_replies WHERE email_tracking_id = ?1"
            ))?;
            match stmt.query_row(params![tracking_id], map_reply_row) {
                Ok(reply) => Ok(Some(reply)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the `(tracking_id, provider message id)` pair after a successful
/// provider send. Deliberately does NOT stamp `email_sent_at`; that column is
/// set by the later `processed` webhook.
pub async fn set_email_correlation(
    db: &Database,
    reply_id: i64,
    tracking_id: &str,
    message_id: &str,
) -> Result<(), PortalError> {
    let tracking_id = tracking_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE ticket_replies
                 SET email_tracking_id = ?2, smtp2go_message_id = ?3
                 WHERE id = ?1",
                params![reply_id, tracking_id, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a normalized tracking event to a reply's columns, idempotently.
///
/// `count_open` controls whether an `open` event bumps `email_open_count`;
/// the correlator passes false when the event row was a replayed duplicate.
pub async fn apply_tracking_event(
    db: &Database,
    reply_id: i64,
    event_type: TrackingEventType,
    occurred_at: &str,
    count_open: bool,
) -> Result<(), PortalError> {
    let occurred_at = occurred_at.to_string();
    db.connection()
        .call(move |conn| {
            match event_type {
                TrackingEventType::Processed => {
                    // `processed` is the provider accepting the message, which
                    // is also the moment the email counts as sent.
                    conn.execute(
                        "UPDATE ticket_replies
                         SET email_processed_at = COALESCE(email_processed_at, ?2),
                             email_sent_at = COALESCE(email_sent_at, ?2)
                         WHERE id = ?1",
                        params![reply_id, occurred_at],
                    )?;
                }
                TrackingEventType::Delivered => {
                    conn.execute(
                        "UPDATE ticket_replies
                         SET email_delivered_at = COALESCE(email_delivered_at, ?2)
                         WHERE id = ?1",
                        params![reply_id, occurred_at],
                    )?;
                }
                TrackingEventType::Open => {
                    if count_open {
                        conn.execute(
                            "UPDATE ticket_replies
                             SET email_opened_at = COALESCE(email_opened_at, ?2),
                                 email_open_count = email_open_count + 1
                             WHERE id = ?1",
                            params![reply_id, occurred_at],
                        )?;
                    } else {
                        conn.execute(
                            "UPDATE ticket_replies
                             SET email_opened_at = COALESCE(email_opened_at, ?2)
                             WHERE id = ?1",
                            params![reply_id, occurred_at],
                        )?;
                    }
                }
                TrackingEventType::Bounce => {
                    conn.execute(
                        "UPDATE ticket_replies
                         SET email_bounced_at = COALESCE(email_bounced_at, ?2)
                         WHERE id = ?1",
                        params![reply_id, occurred_at],
                    )?;
                }
                TrackingEventType::Rejected => {
                    conn.execute(
                        "UPDATE ticket_replies
                         SET email_rejected_at = COALESCE(email_rejected_at, ?2)
                         WHERE id = ?1",
                        params![reply_id, occurred_at],
                    )?;
                }
                // Click and spam events are stored in email_tracking_events
                // but have no reply column to update.
                TrackingEventType::Click | TrackingEventType::Spam => {}
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn map_reply_row(row: &rusqlite::Row<'_>) -> Result<TicketReply, rusqlite::Error> {
    Ok(TicketReply {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        minutes_spent: row.get(4)?,
        is_billable: row.get(5)?,
        email_tracking_id: row.get(6)?,
        smtp2go_message_id: row.get(7)?,
        email_sent_at: row.get(8)?,
        email_processed_at: row.get(9)?,
        email_delivered_at: row.get(10)?,
        email_opened_at: row.get(11)?,
        email_bounced_at: row.get(12)?,
        email_rejected_at: row.get(13)?,
        email_open_count: row.get(14)?,
    })
}
