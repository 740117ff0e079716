// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal ticketing surface for the create-ticket / create-task handlers
//! and the invoice builder's billing query.

use myportal_core::PortalError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{Ticket, TicketTask};

/// Parameters for creating a ticket.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub company_id: Option<i64>,
    pub requester_id: Option<i64>,
    pub assigned_user_id: Option<i64>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub module_slug: Option<String>,
    pub external_reference: Option<String>,
    /// When set, an initial conversation entry authored by this user is
    /// created from the description.
    pub initial_reply_author_id: Option<i64>,
}

impl NewTicket {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

/// Result of ticket creation.
#[derive(Debug, Clone)]
pub struct CreatedTicket {
    pub ticket_id: i64,
    /// Id of the initial conversation entry, when one was created.
    pub initial_reply_id: Option<i64>,
}

/// Billable minutes per ticket, as consumed by the invoice builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillableTicket {
    pub ticket_id: i64,
    pub subject: String,
    pub company_id: Option<i64>,
    pub billable_minutes: i64,
}

/// Create a ticket, optionally with an initial reply, in one transaction.
pub async fn create_ticket(db: &Database, ticket: &NewTicket) -> Result<CreatedTicket, PortalError> {
    let ticket = ticket.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO tickets (subject, description, company_id, requester_id,
                                      assigned_user_id, priority, status, category,
                                      module_slug, external_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    ticket.subject,
                    ticket.description,
                    ticket.company_id,
                    ticket.requester_id,
                    ticket.assigned_user_id,
                    ticket.priority,
                    ticket.status,
                    ticket.category,
                    ticket.module_slug,
                    ticket.external_reference,
                ],
            )?;
            let ticket_id = tx.last_insert_rowid();

            let initial_reply_id = if let Some(author_id) = ticket.initial_reply_author_id {
                tx.execute(
                    "INSERT INTO ticket_replies (ticket_id, author_id, body)
                     VALUES (?1, ?2, ?3)",
                    params![ticket_id, author_id, ticket.description],
                )?;
                Some(tx.last_insert_rowid())
            } else {
                None
            };

            tx.commit()?;
            Ok(CreatedTicket {
                ticket_id,
                initial_reply_id,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Create a single ticket task. Returns the task id.
pub async fn create_task(
    db: &Database,
    ticket_id: i64,
    task_name: &str,
    sort_order: i64,
) -> Result<i64, PortalError> {
    let task_name = task_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO ticket_tasks (ticket_id, task_name, sort_order)
                 VALUES (?1, ?2, ?3)",
                params![ticket_id, task_name, sort_order],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a ticket by id.
pub async fn get_ticket(db: &Database, ticket_id: i64) -> Result<Option<Ticket>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, description, company_id, requester_id, assigned_user_id,
                        priority, status, category, module_slug, external_reference, created_at
                 FROM tickets WHERE id = ?1",
            )?;
            match stmt.query_row(params![ticket_id], |row| {
                Ok(Ticket {
                    id: row.get(0)?,
                    subject: row.get(1)?,
                    description: row.get(2)?,
                    company_id: row.get(3)?,
                    requester_id: row.get(4)?,
                    assigned_user_id: row.get(5)?,
                    priority: row.get(6)?,
                    status: row.get(7)?,
                    category: row.get(8)?,
                    module_slug: row.get(9)?,
                    external_reference: row.get(10)?,
                    created_at: row.get(11)?,
                })
            }) {
                Ok(ticket) => Ok(Some(ticket)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List tasks for a ticket in sort order.
pub async fn list_tasks(db: &Database, ticket_id: i64) -> Result<Vec<TicketTask>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ticket_id, task_name, sort_order, created_at
                 FROM ticket_tasks WHERE ticket_id = ?1
                 ORDER BY sort_order ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![ticket_id], |row| {
                Ok(TicketTask {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    task_name: row.get(2)?,
                    sort_order: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Sum billable minutes per ticket for the given ids.
///
/// Tickets with no billable replies come back with zero minutes; the invoice
/// builder decides whether to omit them.
pub async fn billable_minutes(
    db: &Database,
    ticket_ids: &[i64],
) -> Result<Vec<BillableTicket>, PortalError> {
    let ticket_ids = ticket_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut result = Vec::with_capacity(ticket_ids.len());
            let mut stmt = conn.prepare(
                "SELECT t.id, t.subject, t.company_id,
                        COALESCE(SUM(CASE WHEN r.is_billable THEN r.minutes_spent ELSE 0 END), 0)
                 FROM tickets t
                 LEFT JOIN ticket_replies r ON r.ticket_id = t.id
                 WHERE t.id = ?1
                 GROUP BY t.id",
            )?;
            for ticket_id in ticket_ids {
                match stmt.query_row(params![ticket_id], |row| {
                    Ok(BillableTicket {
                        ticket_id: row.get(0)?,
                        subject: row.get(1)?,
                        company_id: row.get(2)?,
                        billable_minutes: row.get(3)?,
                    })
                }) {
                    Ok(billing) => result.push(billing),
                    Err(rusqlite::Error::QueryReturnedNoRows) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::replies;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_ticket_with_initial_reply() {
        let (db, _dir) = setup_db().await;

        let created = create_ticket(
            &db,
            &NewTicket {
                subject: "VPN broken".into(),
                description: "Cannot connect since this morning".into(),
                requester_id: Some(9),
                initial_reply_author_id: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let reply_id = created.initial_reply_id.expect("initial reply created");
        let reply = replies::get_reply(&db, reply_id).await.unwrap().unwrap();
        assert_eq!(reply.ticket_id, created.ticket_id);
        assert_eq!(reply.author_id, Some(9));
        assert_eq!(reply.body, "Cannot connect since this morning");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_ticket_without_reply() {
        let (db, _dir) = setup_db().await;
        let created = create_ticket(&db, &NewTicket::new("Just a ticket")).await.unwrap();
        assert!(created.initial_reply_id.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn billable_minutes_sums_only_billable() {
        let (db, _dir) = setup_db().await;

        let t1 = create_ticket(
            &db,
            &NewTicket {
                subject: "T1".into(),
                company_id: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .ticket_id;
        replies::insert_reply(&db, t1, None, "work", 30, true).await.unwrap();
        replies::insert_reply(&db, t1, None, "chat", 15, false).await.unwrap();

        let billing = billable_minutes(&db, &[t1]).await.unwrap();
        assert_eq!(billing.len(), 1);
        assert_eq!(billing[0].billable_minutes, 30);
        assert_eq!(billing[0].company_id, Some(7));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn tasks_are_listed_in_sort_order() {
        let (db, _dir) = setup_db().await;

        let t = create_ticket(&db, &NewTicket::new("tasks")).await.unwrap().ticket_id;
        create_task(&db, t, "B", 20).await.unwrap();
        create_task(&db, t, "A", 10).await.unwrap();

        let tasks = list_tasks(&db, t).await.unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.task_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        db.close().await.unwrap();
    }
}
