// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the integration core.
//!
//! Row types carry their timestamps as ISO-8601 strings exactly as stored;
//! parsing into `chrono` types happens only where arithmetic is needed.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a webhook event.
///
/// Terminal statuses (`Succeeded`, `Failed`, `Skipped`) never transition back
/// to a non-terminal status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Skipped,
}

impl EventStatus {
    /// True for statuses that end the event's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventStatus::Succeeded | EventStatus::Failed | EventStatus::Skipped
        )
    }
}

/// One persisted integration exchange, outbound or inbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    /// Dot-separated event type, e.g. `module.sms-gateway.send`.
    pub name: String,
    /// Module slug, or `None` for inbound exchanges.
    pub slug: Option<String>,
    pub target_url: Option<String>,
    /// JSON snapshot of the dispatched payload.
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub attempt_count: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub response_status: Option<i64>,
    /// Truncated response body (4 KB cap applied on write).
    pub response_body: Option<String>,
    /// Free-form correlation identifiers (ticket_id, reply_id,
    /// provider_message_id, tracking_id).
    pub correlation_ids: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Parameters for inserting a new `pending` webhook event.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub name: String,
    pub slug: Option<String>,
    pub target_url: Option<String>,
    pub payload: serde_json::Value,
    pub max_attempts: i64,
    pub correlation_ids: Option<serde_json::Value>,
}

/// One dispatch attempt of a webhook event.
///
/// `attempt_number` values for an event form a dense 1-based sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub event_id: i64,
    pub attempt_number: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

/// A configurable integration module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub enabled: bool,
    /// Coerced settings object. Secrets are redacted on any read outside the
    /// dispatcher path.
    pub settings: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalized SMTP2Go tracking event type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrackingEventType {
    Processed,
    Delivered,
    Open,
    Click,
    Bounce,
    Spam,
    Rejected,
}

impl TrackingEventType {
    /// Map a provider event name to the internal type. Unknown names yield
    /// `None` and are accepted-and-discarded by the correlator.
    pub fn from_provider(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "processed" => Some(Self::Processed),
            "delivered" => Some(Self::Delivered),
            "open" | "opened" => Some(Self::Open),
            "click" | "clicked" => Some(Self::Click),
            "bounce" | "bounced" | "hard_bounce" | "soft_bounce" => Some(Self::Bounce),
            "spam" | "spam_complaint" => Some(Self::Spam),
            "reject" | "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A persisted email tracking event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTrackingEvent {
    pub id: i64,
    pub tracking_id: String,
    pub event_type: TrackingEventType,
    pub event_url: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub occurred_at: String,
    /// Full raw provider payload, kept for debugging.
    pub raw_payload: serde_json::Value,
    pub created_at: String,
}

/// Ticket reply row as seen by the core: the tracking columns plus the
/// billing fields the invoice builder reads. The ticketing collaborator owns
/// the rest of the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketReply {
    pub id: i64,
    pub ticket_id: i64,
    pub author_id: Option<i64>,
    pub body: String,
    pub minutes_spent: i64,
    pub is_billable: bool,
    pub email_tracking_id: Option<String>,
    pub smtp2go_message_id: Option<String>,
    pub email_sent_at: Option<String>,
    pub email_processed_at: Option<String>,
    pub email_delivered_at: Option<String>,
    pub email_opened_at: Option<String>,
    pub email_bounced_at: Option<String>,
    pub email_rejected_at: Option<String>,
    pub email_open_count: i64,
}

/// An inbound Uptime Kuma alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub event_uuid: Option<String>,
    pub monitor_id: Option<i64>,
    pub monitor_name: Option<String>,
    pub status: Option<String>,
    pub previous_status: Option<String>,
    pub importance: bool,
    /// Normalized to UTC when the payload carried a time.
    pub occurred_at: Option<String>,
    pub received_at: String,
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
    pub payload: serde_json::Value,
}

/// A stored message template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Lowercase `[a-z0-9._-]`, at most 120 characters.
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// `text/plain` or `text/html`.
    pub content_type: String,
    pub content: String,
    pub updated_at: String,
}

/// Minimal ticket row for the create-ticket handler and invoice builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
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
    pub created_at: String,
}

/// Minimal ticket task row for the create-task handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTask {
    pub id: i64,
    pub ticket_id: i64,
    pub task_name: String,
    pub sort_order: i64,
    pub created_at: String,
}

/// Result returned by `trigger_module`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub event_id: Option<i64>,
    pub status: EventStatus,
    /// Handler response body on synchronous success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Human-readable reason for `skipped` or `failed` outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(EventStatus::Succeeded.is_terminal());
        assert!(EventStatus::Failed.is_terminal());
        assert!(EventStatus::Skipped.is_terminal());
        assert!(!EventStatus::Pending.is_terminal());
        assert!(!EventStatus::InFlight.is_terminal());
    }

    #[test]
    fn event_status_round_trips_snake_case() {
        assert_eq!(EventStatus::InFlight.to_string(), "in_flight");
        assert_eq!(
            "in_flight".parse::<EventStatus>().unwrap(),
            EventStatus::InFlight
        );
        assert_eq!("pending".parse::<EventStatus>().unwrap(), EventStatus::Pending);
    }

    #[test]
    fn tracking_event_type_from_provider_aliases() {
        assert_eq!(
            TrackingEventType::from_provider("Opened"),
            Some(TrackingEventType::Open)
        );
        assert_eq!(
            TrackingEventType::from_provider(" bounce "),
            Some(TrackingEventType::Bounce)
        );
        assert_eq!(TrackingEventType::from_provider("unsubscribe"), None);
    }

    #[test]
    fn dispatch_outcome_skips_empty_fields() {
        let outcome = DispatchOutcome {
            event_id: Some(7),
            status: EventStatus::Skipped,
            response: None,
            reason: Some("Module disabled".into()),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"skipped\""));
        assert!(!json.contains("response"));
    }
}
