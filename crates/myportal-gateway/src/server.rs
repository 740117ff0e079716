// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server setup.
//!
//! Builds the router, shared state, and middleware, and binds the listener.

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use myportal_context::TemplateStore;
use myportal_core::PortalError;
use myportal_dispatch::Dispatcher;
use myportal_modules::ModuleRegistry;
use myportal_storage::Database;
use myportal_xero::{TokenCache, XeroClient};

use crate::{events, modules, smtp2go, templates, tracking, uptimekuma, xero};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: ModuleRegistry,
    pub dispatcher: Dispatcher,
    pub templates: TemplateStore,
    pub xero_tokens: Arc<TokenCache>,
    pub xero: XeroClient,
    /// Public base URL of the portal, e.g. `https://portal.example.com`.
    pub public_url: String,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the gateway router.
///
/// Split into route groups: unauthenticated public routes (health and the
/// tracking endpoints email clients hit), inbound webhook routes whose auth
/// is per-endpoint (signature or shared secret), and the management API.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(get_health))
        .route("/t/open.gif", get(tracking::open_pixel))
        .route("/t/click", get(tracking::click_redirect))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route("/api/webhooks/smtp2go/events", post(smtp2go::receive_event))
        .route(
            "/api/integration-modules/uptimekuma/alerts",
            post(uptimekuma::receive_alert),
        )
        .route(
            "/api/integration-modules/xero/callback",
            post(xero::callback).get(xero::callback_probe),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/integration-modules", get(modules::list_modules))
        .route(
            "/api/integration-modules/{slug}",
            get(modules::get_module).patch(modules::update_module),
        )
        .route(
            "/api/integration-modules/{slug}/trigger",
            post(modules::trigger_module),
        )
        .route(
            "/api/integration-modules/xero/tenants",
            get(xero::list_tenants),
        )
        .route("/api/webhook-events", get(events::list_events))
        .route("/api/webhook-events/{id}", get(events::get_event))
        .route("/api/message-templates", get(templates::list_templates))
        .route(
            "/api/message-templates/{slug}",
            axum::routing::put(templates::upsert_template).delete(templates::delete_template),
        )
        .route(
            "/api/message-templates/{slug}/render",
            post(templates::render_template),
        )
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until the task is dropped.
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<(), PortalError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PortalError::transport(format!("failed to bind gateway to {addr}"), e))?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| PortalError::transport("gateway server error", e))?;

    Ok(())
}

async fn get_health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Map a `PortalError` to an HTTP response.
///
/// Configuration mistakes are the caller's fault (400); unknown modules and
/// modules without a dispatch handler are 404; everything else is a 500 with
/// the message passed through.
pub(crate) fn error_response(err: PortalError) -> Response {
    let status = match &err {
        PortalError::Config(_) => StatusCode::BAD_REQUEST,
        PortalError::ModuleNotConfigured { .. } | PortalError::HandlerNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
