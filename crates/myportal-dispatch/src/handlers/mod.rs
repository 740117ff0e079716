// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handler implementations, one module per integration.

pub mod email;
pub mod ntfy;
pub mod ollama;
pub mod sms;
pub mod tacticalrmm;
pub mod ticketing;
pub mod unifi_talk;
pub mod xero;

use std::sync::Arc;

use myportal_modules::ModuleSlug;

use crate::dispatcher::Services;
use crate::handler::HandlerRegistry;

/// Wire every known slug to its handler.
pub fn register_all(registry: &mut HandlerRegistry, services: &Services) {
    registry.register(
        ModuleSlug::Ollama,
        Arc::new(ollama::OllamaHandler::new(services.http.clone())),
    );
    registry.register(
        ModuleSlug::Smtp,
        Arc::new(email::SmtpHandler::new(services.email.clone())),
    );
    registry.register(
        ModuleSlug::Smtp2go,
        Arc::new(email::Smtp2goHandler::new(services.email.clone())),
    );
    registry.register(
        ModuleSlug::TacticalRmm,
        Arc::new(tacticalrmm::TacticalRmmHandler::new(services.http.clone())),
    );
    registry.register(
        ModuleSlug::Ntfy,
        Arc::new(ntfy::NtfyHandler::new(services.http.clone())),
    );
    registry.register(
        ModuleSlug::SmsGateway,
        Arc::new(sms::SmsGatewayHandler::new(services.http.clone())),
    );
    registry.register(
        ModuleSlug::CreateTicket,
        Arc::new(ticketing::CreateTicketHandler::new(services.db.clone())),
    );
    registry.register(
        ModuleSlug::CreateTask,
        Arc::new(ticketing::CreateTaskHandler::new(services.db.clone())),
    );
    registry.register(
        ModuleSlug::Xero,
        Arc::new(xero::XeroHandler::new(
            services.db.clone(),
            services.xero_tokens.clone(),
            services.xero.clone(),
        )),
    );
    registry.register(
        ModuleSlug::UnifiTalk,
        Arc::new(unifi_talk::UnifiTalkHandler::new(
            services.recordings.clone(),
        )),
    );
}
