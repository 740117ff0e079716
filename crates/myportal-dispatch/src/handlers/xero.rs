// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Xero handler: builds invoice payloads from billable ticket time and
//! posts them through the OAuth-backed client.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use myportal_core::PortalError;
use myportal_storage::Database;
use myportal_storage::queries::tickets;
use myportal_xero::invoices::{self, InvoiceParams, OrderItem};
use myportal_xero::oauth::RefreshCredentials;
use myportal_xero::{TokenCache, XeroClient};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

pub struct XeroHandler {
    db: Database,
    tokens: Arc<TokenCache>,
    client: XeroClient,
}

impl XeroHandler {
    pub fn new(db: Database, tokens: Arc<TokenCache>, client: XeroClient) -> Self {
        Self { db, tokens, client }
    }
}

fn credentials(settings: &Value) -> Result<(RefreshCredentials, String), PortalError> {
    for key in ["client_id", "client_secret", "refresh_token", "tenant_id"] {
        if setting_str(settings, key).is_empty() {
            return Err(PortalError::Config(format!(
                "xero module has no {key} configured"
            )));
        }
    }
    Ok((
        RefreshCredentials {
            client_id: setting_str(settings, "client_id").to_string(),
            client_secret: setting_str(settings, "client_secret").to_string(),
            refresh_token: setting_str(settings, "refresh_token").to_string(),
        },
        setting_str(settings, "tenant_id").to_string(),
    ))
}

fn invoice_params(settings: &Value, payload: &Value) -> Result<InvoiceParams, PortalError> {
    let rate_raw = payload_str(payload, "hourly_rate")
        .unwrap_or_else(|| setting_str(settings, "default_hourly_rate").to_string());
    let hourly_rate = Decimal::from_str(&rate_raw)
        .map_err(|_| PortalError::Config(format!("invalid hourly rate {rate_raw:?}")))?;

    let optional = |key: &str| {
        let value = setting_str(settings, key);
        (!value.is_empty()).then(|| value.to_string())
    };
    let line_amount_type = setting_str(settings, "line_amount_type");
    Ok(InvoiceParams {
        hourly_rate,
        account_code: optional("account_code"),
        tax_type: optional("tax_type"),
        line_amount_type: if line_amount_type.is_empty() {
            "Exclusive".to_string()
        } else {
            line_amount_type.to_string()
        },
        reference_prefix: payload_str(payload, "reference_prefix"),
    })
}

fn ticket_ids(payload: &Value) -> Result<Vec<i64>, PortalError> {
    let ids: Vec<i64> = payload
        .get("ticket_ids")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(PortalError::Config(
            "xero invoice dispatch requires a non-empty ticket_ids array".to_string(),
        ));
    }
    Ok(ids)
}

fn order_items(payload: &Value) -> Result<Vec<OrderItem>, PortalError> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| PortalError::Config("order invoice requires an items array".to_string()))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let decimal = |key: &str| -> Result<Decimal, PortalError> {
                let raw = match item.get(key) {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.trim().to_string(),
                    _ => String::new(),
                };
                Decimal::from_str(&raw).map_err(|_| {
                    PortalError::Config(format!("order item {index} has invalid {key}"))
                })
            };
            Ok(OrderItem {
                description: payload_str(item, "description")
                    .ok_or_else(|| {
                        PortalError::Config(format!("order item {index} has no description"))
                    })?,
                quantity: decimal("quantity")?,
                unit_amount: decimal("unit_amount")?,
            })
        })
        .collect()
}

#[async_trait]
impl ModuleHandler for XeroHandler {
    fn verb(&self) -> &'static str {
        "invoice"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        credentials(settings)?;
        invoice_params(settings, payload)?;
        match payload_str(payload, "action").as_deref() {
            Some("create_order_invoice") => {
                order_items(payload)?;
                if payload_str(payload, "order_number").is_none() {
                    return Err(PortalError::Config("order invoice requires order_number".to_string()));
                }
                if payload.get("company_id").and_then(Value::as_i64).is_none() {
                    return Err(PortalError::Config("order invoice requires company_id".to_string()));
                }
            }
            Some("create_ticket_invoices") | None => {
                ticket_ids(payload)?;
            }
            Some(other) => {
                return Err(PortalError::Config(format!("unknown xero action {other:?}")));
            }
        }
        Ok(Prepared::single_attempt(Some(
            "https://api.xero.com/api.xro/2.0/Invoices".to_string(),
        )))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let (creds, tenant_id) = credentials(settings)?;
        let params = invoice_params(settings, payload)?;

        let invoices = match payload_str(payload, "action").as_deref() {
            Some("create_order_invoice") => {
                let order_number = payload_str(payload, "order_number")
                    .ok_or_else(|| HandlerError::from(PortalError::Config("no order_number".to_string())))?;
                let company_id = payload
                    .get("company_id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| HandlerError::from(PortalError::Config("no company_id".to_string())))?;
                vec![invoices::build_order_invoice(
                    &order_number,
                    company_id,
                    &order_items(payload)?,
                    &params,
                )]
            }
            _ => {
                let ids = ticket_ids(payload)?;
                let billables = tickets::billable_minutes(&self.db, &ids).await?;
                invoices::build_ticket_invoices(&billables, &params)
            }
        };

        if invoices.is_empty() {
            return Ok(HandlerOutput::Skipped {
                reason: "no billable time to invoice".to_string(),
            });
        }

        let access_token = self.tokens.access_token(&tenant_id, &creds).await?;
        let body = self
            .client
            .create_invoices(&access_token, &tenant_id, &invoices)
            .await?;
        Ok(HandlerOutput::Success {
            response_status: Some(200),
            response: json!({"invoices": invoices.len(), "result": body}),
        })
    }
}
