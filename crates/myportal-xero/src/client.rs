// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Xero connections and accounting APIs.

use myportal_core::PortalError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::invoices::Invoice;

const API_BASE_URL: &str = "https://api.xero.com";

/// One authorized Xero organisation connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    #[serde(rename = "tenantName")]
    pub tenant_name: Option<String>,
    #[serde(rename = "tenantType")]
    pub tenant_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct XeroClient {
    client: reqwest::Client,
    base_url: String,
}

impl XeroClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// List the tenants the access token can act on.
    pub async fn connections(&self, access_token: &str) -> Result<Vec<Tenant>, PortalError> {
        let response = self
            .client
            .get(format!("{}/connections", self.base_url))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PortalError::transport("connections request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Transport {
                message: format!("connections request failed with status {status}: {body}"),
                source: None,
            });
        }
        response
            .json()
            .await
            .map_err(|e| PortalError::transport("connections response was not JSON", e))
    }

    /// Create invoices in the tenant's organisation.
    pub async fn create_invoices(
        &self,
        access_token: &str,
        tenant_id: &str,
        invoices: &[Invoice],
    ) -> Result<Value, PortalError> {
        let response = self
            .client
            .post(format!("{}/api.xro/2.0/Invoices", self.base_url))
            .bearer_auth(access_token)
            .header("xero-tenant-id", tenant_id)
            .header("Accept", "application/json")
            .json(&json!({"Invoices": invoices}))
            .send()
            .await
            .map_err(|e| PortalError::transport("invoice create request failed", e))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortalError::transport("invoice response was not JSON", e))?;
        if !status.is_success() {
            return Err(PortalError::Transport {
                message: format!("invoice create failed with status {status}: {body}"),
                source: None,
            });
        }
        info!(tenant_id, count = invoices.len(), "invoices created");
        Ok(body)
    }
}
