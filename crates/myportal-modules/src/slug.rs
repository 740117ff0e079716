// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of known module slugs.
//!
//! Modeling the slugs as an enum makes the handler table a compile-time set:
//! adding a module means adding a variant here, a settings table entry in
//! `coerce`, and a handler in the dispatch crate.

use strum::{Display, EnumIter, EnumString};

/// Known integration module slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum ModuleSlug {
    #[strum(serialize = "ollama")]
    Ollama,
    #[strum(serialize = "smtp")]
    Smtp,
    #[strum(serialize = "smtp2go")]
    Smtp2go,
    #[strum(serialize = "tacticalrmm")]
    TacticalRmm,
    #[strum(serialize = "ntfy")]
    Ntfy,
    #[strum(serialize = "sms-gateway")]
    SmsGateway,
    #[strum(serialize = "uptimekuma")]
    UptimeKuma,
    #[strum(serialize = "chatgpt-mcp")]
    ChatgptMcp,
    #[strum(serialize = "xero")]
    Xero,
    #[strum(serialize = "create-ticket")]
    CreateTicket,
    #[strum(serialize = "create-task")]
    CreateTask,
    #[strum(serialize = "unifi-talk")]
    UnifiTalk,
}

impl ModuleSlug {
    /// Display name, description, and icon used when seeding defaults.
    pub fn descriptor(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Ollama => ("Ollama", "Local LLM text generation", "cpu"),
            Self::Smtp => ("SMTP Relay", "Outbound email via a plain SMTP relay", "mail"),
            Self::Smtp2go => ("SMTP2Go", "Outbound email with delivery tracking", "send"),
            Self::TacticalRmm => ("Tactical RMM", "Remote monitoring and management API", "server"),
            Self::Ntfy => ("ntfy", "Push notifications", "bell"),
            Self::SmsGateway => ("SMS Gateway", "Outbound SMS via an HTTP gateway", "message-circle"),
            Self::UptimeKuma => ("Uptime Kuma", "Inbound uptime alerts", "activity"),
            Self::ChatgptMcp => ("ChatGPT MCP", "Inbound MCP tool calls", "bot"),
            Self::Xero => ("Xero", "Invoicing and accounting", "file-text"),
            Self::CreateTicket => ("Create Ticket", "Create helpdesk tickets from integrations", "ticket"),
            Self::CreateTask => ("Create Task", "Create ticket tasks from integrations", "check-square"),
            Self::UnifiTalk => ("Unifi Talk", "Call recording download and cataloguing", "phone"),
        }
    }
}
