// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth2 refresh-token exchange with a per-tenant token cache.
//!
//! Tokens are cached until `expires_in` minus a safety margin. Concurrent
//! refreshes for the same tenant are single-flighted; only one exchange is
//! ever in flight per tenant.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use myportal_core::PortalError;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_URL: &str = "https://identity.xero.com/connect/token";
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Credentials for one refresh exchange.
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

pub struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    tokens: DashMap<String, CachedToken>,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            token_url: TOKEN_URL.to_string(),
            tokens: DashMap::new(),
            flights: DashMap::new(),
        }
    }

    /// Overrides the token endpoint (for testing with wiremock).
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    /// Return a valid access token for the tenant, refreshing if needed.
    pub async fn access_token(
        &self,
        tenant_key: &str,
        credentials: &RefreshCredentials,
    ) -> Result<String, PortalError> {
        if let Some(token) = self.fresh_token(tenant_key) {
            return Ok(token);
        }

        let flight = self
            .flights
            .entry(tenant_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // Another caller may have refreshed while we waited on the flight.
        if let Some(token) = self.fresh_token(tenant_key) {
            return Ok(token);
        }

        let token = self.refresh(credentials).await?;
        self.tokens.insert(tenant_key.to_string(), token.clone());
        debug!(tenant = tenant_key, "access token refreshed");
        Ok(token.access_token)
    }

    fn fresh_token(&self, tenant_key: &str) -> Option<String> {
        self.tokens
            .get(tenant_key)
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| t.access_token.clone())
    }

    async fn refresh(&self, credentials: &RefreshCredentials) -> Result<CachedToken, PortalError> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let response = self
            .client
            .post(&self.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PortalError::transport("token refresh request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Transport {
                message: format!("token refresh failed with status {status}: {body}"),
                source: None,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortalError::transport("token response was not JSON", e))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> RefreshCredentials {
        RefreshCredentials {
            client_id: "CID".to_string(),
            client_secret: "CSECRET".to_string(),
            refresh_token: "RTOKEN".to_string(),
        }
    }

    #[tokio::test]
    async fn refresh_exchanges_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .and(header("Authorization", "Basic Q0lEOkNTRUNSRVQ="))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=RTOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT1", "expires_in": 1800, "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(reqwest::Client::new())
            .with_token_url(format!("{}/connect/token", server.uri()));

        let first = cache.access_token("tenant-a", &credentials()).await.unwrap();
        let second = cache.access_token("tenant-a", &credentials()).await.unwrap();
        assert_eq!(first, "AT1");
        assert_eq!(second, "AT1");
    }

    #[tokio::test]
    async fn expired_token_triggers_new_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                // Inside the safety margin, so never considered fresh.
                "access_token": "SHORT", "expires_in": 10
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = TokenCache::new(reqwest::Client::new())
            .with_token_url(format!("{}/connect/token", server.uri()));

        cache.access_token("tenant-a", &credentials()).await.unwrap();
        cache.access_token("tenant-a", &credentials()).await.unwrap();
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let cache = TokenCache::new(reqwest::Client::new())
            .with_token_url(format!("{}/connect/token", server.uri()));

        let err = cache
            .access_token("tenant-a", &credentials())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
