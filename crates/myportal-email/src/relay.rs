// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain SMTP relay transport via `lettre`.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use myportal_core::PortalError;
use tracing::info;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Relay configuration resolved from the `smtp` module settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_starttls: bool,
}

/// One message for the relay.
#[derive(Debug)]
pub struct RelayMessage {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

/// Send one RFC 5322 message through the configured relay.
///
/// All failures map to [`PortalError::EmailDispatch`] so callers can record
/// relay problems distinctly from provider API errors.
pub async fn send(config: &RelayConfig, message: &RelayMessage) -> Result<(), PortalError> {
    let email = build_message(message)?;
    let transport = build_transport(config)?;

    transport.send(email).await.map_err(|e| PortalError::EmailDispatch {
        message: format!("SMTP relay send via {} failed: {e}", config.host),
        source: Some(Box::new(e)),
    })?;
    info!(host = %config.host, recipients = message.to.len(), "relay send complete");
    Ok(())
}

fn build_transport(
    config: &RelayConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, PortalError> {
    let mut builder = if config.use_starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
            PortalError::EmailDispatch {
                message: format!("invalid SMTP relay host {:?}: {e}", config.host),
                source: Some(Box::new(e)),
            }
        })?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };
    builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
    if !config.username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
    }
    Ok(builder.build())
}

fn build_message(message: &RelayMessage) -> Result<Message, PortalError> {
    let parse_mailbox = |addr: &str| -> Result<Mailbox, PortalError> {
        addr.parse().map_err(|e| PortalError::EmailDispatch {
            message: format!("invalid mailbox {addr:?}: {e}"),
            source: None,
        })
    };

    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(&message.subject);
    for recipient in &message.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }

    let built = match &message.text_body {
        Some(text) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(message.html_body.clone()),
                ),
        ),
        None => builder
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone()),
    };
    built.map_err(|e| PortalError::EmailDispatch {
        message: format!("failed to build relay message: {e}"),
        source: Some(Box::new(e)),
    })
}
