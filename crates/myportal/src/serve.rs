// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `myportal serve` command implementation.
//!
//! Wires storage, the module registry, the dispatcher, the email pipeline,
//! and the gateway together, then serves until SIGINT/SIGTERM. Background
//! dispatch tasks are drained before exit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use myportal_config::PortalConfig;
use myportal_context::TemplateStore;
use myportal_core::PortalError;
use myportal_dispatch::{Dispatcher, NoRecordingCollaborator, Services};
use myportal_email::{EmailPipeline, Smtp2goClient};
use myportal_gateway::{AppState, ServerConfig};
use myportal_modules::ModuleRegistry;
use myportal_storage::Database;
use myportal_xero::{TokenCache, XeroClient};

use crate::shutdown;

/// Runs the `myportal serve` command.
pub async fn run_serve(config: PortalConfig) -> Result<(), PortalError> {
    init_tracing(&config.portal.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting myportal serve");

    let db = Database::open(&config.storage.database_path).await?;

    // Seed the module catalog before anything can dispatch or receive.
    let registry = ModuleRegistry::new(db.clone());
    registry.ensure_defaults().await?;

    let timeout = Duration::from_secs(config.http.timeout_secs);
    let connect_timeout = Duration::from_secs(config.http.connect_timeout_secs);
    let http = Services::http_client(timeout, connect_timeout)?;
    let smtp2go = Smtp2goClient::new(timeout, connect_timeout)?;

    let email = EmailPipeline::new(
        db.clone(),
        registry.clone(),
        smtp2go,
        config.portal.public_url.clone(),
    );
    let xero_tokens = Arc::new(TokenCache::new(http.clone()));
    let xero = XeroClient::new(http.clone());

    let dispatcher = Dispatcher::new(Services {
        db: db.clone(),
        registry: registry.clone(),
        email,
        http,
        xero_tokens: xero_tokens.clone(),
        xero: xero.clone(),
        recordings: Arc::new(NoRecordingCollaborator),
        public_url: config.portal.public_url.clone(),
    });

    let state = AppState {
        templates: TemplateStore::new(db.clone()),
        db,
        registry,
        dispatcher: dispatcher.clone(),
        xero_tokens,
        xero,
        public_url: config.portal.public_url.clone(),
        start_time: std::time::Instant::now(),
    };

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let cancel = shutdown::install_signal_handler();

    let mut server = tokio::spawn(async move {
        myportal_gateway::start_server(&server_config, state).await
    });

    tokio::select! {
        _ = cancel.cancelled() => {
            info!("shutdown requested, stopping gateway");
            server.abort();
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => warn!("gateway exited unexpectedly"),
                Ok(Err(err)) => return Err(err),
                Err(err) => {
                    return Err(PortalError::Internal(format!("gateway task panicked: {err}")));
                }
            }
        }
    }

    // Let in-flight background dispatches finish before the process exits.
    dispatcher.drain().await;

    info!("myportal serve shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("myportal={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
