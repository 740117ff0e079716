// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the gateway routes against a real on-disk database.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hmac::Mac;
use serde_json::{Value, json};
use tower::ServiceExt;

use myportal_context::TemplateStore;
use myportal_core::{EventStatus, NewWebhookEvent};
use myportal_dispatch::{Dispatcher, NoRecordingCollaborator, Services};
use myportal_email::{EmailPipeline, Smtp2goClient};
use myportal_gateway::{AppState, router};
use myportal_modules::{ModuleRegistry, ModuleSlug};
use myportal_storage::Database;
use myportal_storage::queries::{alerts, events, replies, tickets, tracking};
use myportal_xero::{TokenCache, XeroClient};

async fn setup() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("t.db").to_str().unwrap())
        .await
        .unwrap();
    let registry = ModuleRegistry::new(db.clone());
    registry.ensure_defaults().await.unwrap();

    let http = Services::http_client(Duration::from_secs(5), Duration::from_secs(2)).unwrap();
    let smtp2go = Smtp2goClient::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap();
    let email = EmailPipeline::new(
        db.clone(),
        registry.clone(),
        smtp2go,
        "https://portal.example.com".to_string(),
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
        public_url: "https://portal.example.com".to_string(),
    });

    let state = AppState {
        templates: TemplateStore::new(db.clone()),
        db,
        registry,
        dispatcher,
        xero_tokens,
        xero,
        public_url: "https://portal.example.com".to_string(),
        start_time: std::time::Instant::now(),
    };
    (state, dir)
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seed_correlated_reply(state: &AppState, tracking_id: &str, message_id: &str) -> i64 {
    let created = tickets::create_ticket(
        &state.db,
        &tickets::NewTicket::new("Printer down".to_string()),
    )
    .await
    .unwrap();
    let reply_id = replies::insert_reply(&state.db, created.ticket_id, None, "On it", 0, false)
        .await
        .unwrap();
    replies::set_email_correlation(&state.db, reply_id, tracking_id, message_id)
        .await
        .unwrap();
    reply_id
}

#[tokio::test]
async fn health_reports_version() {
    let (state, _dir) = setup().await;
    let (status, body) = send(
        &state,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn smtp2go_processed_event_stamps_sent_and_processed() {
    let (state, _dir) = setup().await;
    let reply_id = seed_correlated_reply(&state, "TID-1", "MSG-1").await;

    let event = json!({
        "event": "processed",
        "email_id": "MSG-1",
        "recipient": "user@example.com",
        "timestamp": "2025-01-01T12:00:00+00:00"
    });
    let (status, body) = send(&state, post_json("/api/webhooks/smtp2go/events", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["processed"], 1);

    let reply = replies::get_reply(&state.db, reply_id).await.unwrap().unwrap();
    assert_eq!(reply.email_processed_at.as_deref(), Some("2025-01-01T12:00:00Z"));
    assert_eq!(reply.email_sent_at.as_deref(), Some("2025-01-01T12:00:00Z"));
}

#[tokio::test]
async fn smtp2go_out_of_order_delivery_converges() {
    let (state, _dir) = setup().await;
    let reply_id = seed_correlated_reply(&state, "TID-2", "MSG-2").await;

    for (event, ts) in [
        ("delivered", "2025-01-01T12:00:05Z"),
        ("processed", "2025-01-01T12:00:00Z"),
    ] {
        let payload = json!({ "event": event, "email_id": "MSG-2", "timestamp": ts });
        let (status, _) = send(&state, post_json("/api/webhooks/smtp2go/events", &payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let reply = replies::get_reply(&state.db, reply_id).await.unwrap().unwrap();
    assert_eq!(reply.email_delivered_at.as_deref(), Some("2025-01-01T12:00:05Z"));
    assert_eq!(reply.email_processed_at.as_deref(), Some("2025-01-01T12:00:00Z"));
}

#[tokio::test]
async fn smtp2go_replayed_open_counts_once() {
    let (state, _dir) = setup().await;
    let reply_id = seed_correlated_reply(&state, "TID-3", "MSG-3").await;

    let event = json!({
        "event": "open",
        "email_id": "MSG-3",
        "timestamp": "2025-01-01T13:00:00Z"
    });
    for _ in 0..3 {
        let (status, _) = send(&state, post_json("/api/webhooks/smtp2go/events", &event)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let reply = replies::get_reply(&state.db, reply_id).await.unwrap().unwrap();
    assert_eq!(reply.email_open_count, 1);
    assert_eq!(reply.email_opened_at.as_deref(), Some("2025-01-01T13:00:00Z"));
}

#[tokio::test]
async fn smtp2go_orphan_event_is_kept_under_provider_id() {
    let (state, _dir) = setup().await;
    let event = json!({ "event": "bounce", "email_id": "NOBODY-9" });
    let (status, body) = send(&state, post_json("/api/webhooks/smtp2go/events", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);

    let rows = tracking::list_tracking_events(&state.db, "NOBODY-9")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn smtp2go_unknown_event_is_discarded() {
    let (state, _dir) = setup().await;
    let event = json!({ "event": "unsubscribe", "email_id": "MSG-X" });
    let (status, body) = send(&state, post_json("/api/webhooks/smtp2go/events", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn smtp2go_signature_gates_when_secret_configured() {
    let (state, _dir) = setup().await;
    state
        .registry
        .update_module(
            ModuleSlug::Smtp2go,
            Some(true),
            Some(&json!({ "webhook_secret": "s3cret" })),
        )
        .await
        .unwrap();

    let body = json!({ "event": "open", "email_id": "MSG-S" }).to_string();

    let (status, _) = send(
        &state,
        Request::post("/api/webhooks/smtp2go/events")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.clone()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(b"s3cret").unwrap();
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    let (status, receipt) = send(
        &state,
        Request::post("/api/webhooks/smtp2go/events")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-smtp2go-signature", signature)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["processed"], 1);
}

#[tokio::test]
async fn uptimekuma_disabled_module_refuses_service() {
    let (state, _dir) = setup().await;
    let (status, _) = send(
        &state,
        post_json(
            "/api/integration-modules/uptimekuma/alerts",
            &json!({ "msg": "down" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn uptimekuma_token_auth_and_storage() {
    let (state, _dir) = setup().await;
    state
        .registry
        .update_module(
            ModuleSlug::UptimeKuma,
            Some(true),
            Some(&json!({ "shared_secret": "kuma-token" })),
        )
        .await
        .unwrap();

    let alert = json!({
        "uuid": "EV-1",
        "monitor": { "id": 4, "name": "Edge" },
        "heartbeat": { "status": 0, "important": true, "time": "2025-02-01 09:00:00" }
    });

    let (status, _) = send(
        &state,
        Request::post("/api/integration-modules/uptimekuma/alerts")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::from(alert.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &state,
        Request::post("/api/integration-modules/uptimekuma/alerts?token=kuma-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(alert.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let alert_id = body["alert_id"].as_i64().unwrap();

    let stored = alerts::get_alert(&state.db, alert_id).await.unwrap().unwrap();
    assert_eq!(stored.event_uuid.as_deref(), Some("EV-1"));
    assert_eq!(stored.monitor_name.as_deref(), Some("Edge"));
    assert_eq!(stored.status.as_deref(), Some("down"));
    assert!(stored.importance);
    assert_eq!(stored.occurred_at.as_deref(), Some("2025-02-01T09:00:00Z"));
}

#[tokio::test]
async fn uptimekuma_malformed_payload_is_rejected() {
    let (state, _dir) = setup().await;
    state
        .registry
        .update_module(ModuleSlug::UptimeKuma, Some(true), None)
        .await
        .unwrap();

    let (status, _) = send(
        &state,
        Request::post("/api/integration-modules/uptimekuma/alerts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uptimekuma_empty_hash_accepts_anonymously() {
    let (state, _dir) = setup().await;
    state
        .registry
        .update_module(ModuleSlug::UptimeKuma, Some(true), None)
        .await
        .unwrap();

    let (status, _) = send(
        &state,
        post_json(
            "/api/integration-modules/uptimekuma/alerts",
            &json!({ "msg": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn xero_callback_probe_round_trip() {
    let (state, _dir) = setup().await;

    let (status, _) = send(
        &state,
        Request::post("/api/integration-modules/xero/callback")
            .header("x-xero-signature", "abc")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(
        &state,
        Request::get("/api/integration-modules/xero/callback?probe=1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn xero_tenants_requires_credentials() {
    let (state, _dir) = setup().await;
    let (status, body) = send(
        &state,
        Request::get("/api/integration-modules/xero/tenants")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("client_id"));
}

#[tokio::test]
async fn event_read_api_lists_and_details() {
    let (state, _dir) = setup().await;
    let event_id = events::insert_event(
        &state.db,
        &NewWebhookEvent {
            name: "module.ntfy.ping".to_string(),
            slug: Some("ntfy".to_string()),
            target_url: Some("https://ntfy.sh/alerts".to_string()),
            payload: json!({ "message": "hi" }),
            max_attempts: 1,
            correlation_ids: None,
        },
    )
    .await
    .unwrap();
    let attempt = events::begin_attempt(&state.db, event_id).await.unwrap();
    events::record_success(&state.db, event_id, attempt, Some(200), Some("ok"))
        .await
        .unwrap();

    let (status, list) = send(
        &state,
        Request::get("/api/webhook-events?limit=10")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = list.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "module.ntfy.ping");
    assert_eq!(rows[0]["status"], "succeeded");
    // Internal payload snapshot never leaves the server.
    assert!(rows[0].get("payload").is_none());

    let (status, detail) = send(
        &state,
        Request::get(format!("/api/webhook-events/{event_id}").as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["attempt_count"], 1);
    assert_eq!(detail["attempts"][0]["attempt_number"], 1);
    assert_eq!(detail["attempts"][0]["response_status"], 200);

    let (status, _) = send(
        &state,
        Request::get("/api/webhook-events/9999")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn module_api_redacts_and_updates() {
    let (state, _dir) = setup().await;

    let (status, list) = send(
        &state,
        Request::get("/api/integration-modules")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 12);

    let patch = json!({ "enabled": true, "settings": { "api_key": "api-XYZ" } });
    let (status, module) = send(
        &state,
        Request::patch("/api/integration-modules/smtp2go")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(patch.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(module["enabled"], true);
    assert_eq!(module["settings"]["api_key"], "********");

    let (status, _) = send(
        &state,
        Request::get("/api/integration-modules/nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trigger_endpoint_reports_skipped_for_disabled_module() {
    let (state, _dir) = setup().await;
    let (status, outcome) = send(
        &state,
        post_json(
            "/api/integration-modules/ntfy/trigger",
            &json!({ "payload": { "message": "hi" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "skipped");
    assert_eq!(outcome["reason"], "Module disabled");
}

#[tokio::test]
async fn open_pixel_records_and_serves_gif() {
    let (state, _dir) = setup().await;
    let reply_id = seed_correlated_reply(&state, "TID-PX", "MSG-PX").await;

    let response = router(state.clone())
        .oneshot(
            Request::get("/t/open.gif?tid=TID-PX")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/gif"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");

    let reply = replies::get_reply(&state.db, reply_id).await.unwrap().unwrap();
    assert_eq!(reply.email_open_count, 1);
    assert!(reply.email_opened_at.is_some());
}

#[tokio::test]
async fn click_records_and_redirects() {
    let (state, _dir) = setup().await;
    seed_correlated_reply(&state, "TID-CL", "MSG-CL").await;

    let response = router(state.clone())
        .oneshot(
            Request::get("/t/click?tid=TID-CL&url=https%3A%2F%2Fexample.com%2Fdocs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/docs"
    );

    let rows = tracking::list_tracking_events(&state.db, "TID-CL")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_url.as_deref(), Some("https://example.com/docs"));

    let (status, _) = send(
        &state,
        Request::get("/t/click?tid=TID-CL&url=javascript%3Aalert(1)")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn template_api_round_trip_with_escaped_render() {
    let (state, _dir) = setup().await;

    let upsert = json!({
        "name": "Ticket reply",
        "content_type": "text/html",
        "content": "<p>Hello {{ REQUESTER_NAME }}, re: {{ TICKET_SUBJECT }}</p>"
    });
    let (status, template) = send(
        &state,
        Request::put("/api/message-templates/ticket.reply")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(upsert.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(template["slug"], "ticket.reply");

    let render = json!({
        "context": {
            "requester": { "name": "Ana <script>" },
            "ticket": { "subject": "VPN & tunnel" }
        },
        "tokens": { "REQUESTER_NAME": "Ana <script>" }
    });
    let (status, body) = send(
        &state,
        post_json("/api/message-templates/ticket.reply/render", &render),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rendered = body["rendered"].as_str().unwrap();
    assert!(rendered.contains("Ana &lt;script&gt;"));
    assert!(rendered.contains("VPN &amp; tunnel"));

    let (status, _) = send(
        &state,
        Request::delete("/api/message-templates/ticket.reply")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &state,
        post_json("/api/message-templates/ticket.reply/render", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bad slugs are configuration errors.
    let (status, _) = send(
        &state,
        Request::put("/api/message-templates/Not%20A%20Slug")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(upsert.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn event_status_wire_spelling() {
    assert_eq!(
        serde_json::to_value(EventStatus::Succeeded).unwrap(),
        json!("succeeded")
    );
}
