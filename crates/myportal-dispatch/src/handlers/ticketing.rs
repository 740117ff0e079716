// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `create-ticket` and `create-task` handlers over the ticketing tables.

use async_trait::async_trait;
use myportal_core::PortalError;
use myportal_storage::Database;
use myportal_storage::queries::tickets::{self, NewTicket};
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_i64, payload_str};

pub struct CreateTicketHandler {
    db: Database,
}

impl CreateTicketHandler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn ticket_from_payload(payload: &Value) -> Result<NewTicket, PortalError> {
    let subject = payload_str(payload, "subject")
        .ok_or_else(|| PortalError::Config("create-ticket requires a subject".to_string()))?;

    let mut ticket = NewTicket::new(subject);
    ticket.description = payload_str(payload, "description").unwrap_or_default();
    ticket.company_id = payload_i64(payload, "company_id");
    ticket.requester_id = payload_i64(payload, "requester_id");
    ticket.assigned_user_id = payload_i64(payload, "assigned_user_id");
    ticket.priority = payload_str(payload, "priority");
    ticket.status = payload_str(payload, "status");
    ticket.category = payload_str(payload, "category");
    ticket.module_slug = payload_str(payload, "module_slug");
    ticket.external_reference = payload_str(payload, "external_reference");
    // A requester plus a description yields an initial conversation entry.
    if ticket.requester_id.is_some() && !ticket.description.is_empty() {
        ticket.initial_reply_author_id = ticket.requester_id;
    }
    Ok(ticket)
}

#[async_trait]
impl ModuleHandler for CreateTicketHandler {
    fn verb(&self) -> &'static str {
        "create"
    }

    fn prepare(&self, _settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        ticket_from_payload(payload)?;
        Ok(Prepared::single_attempt(None))
    }

    async fn execute(
        &self,
        _settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let ticket = ticket_from_payload(payload)?;
        let created = tickets::create_ticket(&self.db, &ticket).await?;
        Ok(HandlerOutput::Success {
            response_status: None,
            response: json!({
                "ticket_id": created.ticket_id,
                "initial_reply_id": created.initial_reply_id,
            }),
        })
    }
}

pub struct CreateTaskHandler {
    db: Database,
}

impl CreateTaskHandler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(Debug, Clone)]
struct TaskSpec {
    ticket_id: i64,
    task_name: String,
    sort_order: i64,
}

/// Accepts either a flat single-task payload or
/// `{context: {ticket_id}, tasks: [...]}` with per-task overrides.
fn tasks_from_payload(payload: &Value) -> Result<Vec<TaskSpec>, PortalError> {
    let default_ticket_id = payload_i64(payload, "ticket_id")
        .or_else(|| payload.pointer("/context/ticket_id").and_then(Value::as_i64));

    let mut specs = Vec::new();
    match payload.get("tasks").and_then(Value::as_array) {
        Some(tasks) => {
            for (index, task) in tasks.iter().enumerate() {
                let task_name = payload_str(task, "task_name")
                    .or_else(|| payload_str(task, "name"))
                    .ok_or_else(|| {
                        PortalError::Config(format!("task {index} has no task_name"))
                    })?;
                let ticket_id = payload_i64(task, "ticket_id")
                    .or(default_ticket_id)
                    .ok_or_else(|| {
                        PortalError::Config(format!("task {index} has no ticket_id"))
                    })?;
                specs.push(TaskSpec {
                    ticket_id,
                    task_name,
                    sort_order: payload_i64(task, "sort_order").unwrap_or(0),
                });
            }
        }
        None => {
            let task_name = payload_str(payload, "task_name").ok_or_else(|| {
                PortalError::Config("create-task requires task_name or a tasks array".to_string())
            })?;
            let ticket_id = default_ticket_id
                .ok_or_else(|| PortalError::Config("create-task requires a ticket_id".to_string()))?;
            specs.push(TaskSpec {
                ticket_id,
                task_name,
                sort_order: payload_i64(payload, "sort_order").unwrap_or(0),
            });
        }
    }
    if specs.is_empty() {
        return Err(PortalError::Config("tasks array is empty".to_string()));
    }
    Ok(specs)
}

#[async_trait]
impl ModuleHandler for CreateTaskHandler {
    fn verb(&self) -> &'static str {
        "create"
    }

    fn prepare(&self, _settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        tasks_from_payload(payload)?;
        Ok(Prepared::single_attempt(None))
    }

    async fn execute(
        &self,
        _settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let specs = tasks_from_payload(payload)?;
        let mut task_ids = Vec::with_capacity(specs.len());
        for spec in &specs {
            let task_id =
                tickets::create_task(&self.db, spec.ticket_id, &spec.task_name, spec.sort_order)
                    .await?;
            task_ids.push(task_id);
        }
        Ok(HandlerOutput::Success {
            response_status: None,
            response: json!({"count": task_ids.len(), "task_ids": task_ids}),
        })
    }
}
