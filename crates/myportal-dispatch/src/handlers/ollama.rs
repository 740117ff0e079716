// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama generation handler.

use async_trait::async_trait;
use myportal_core::PortalError;
use serde_json::{Value, json};

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, payload_str, setting_str};

pub struct OllamaHandler {
    http: reqwest::Client,
}

impl OllamaHandler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn resolve_prompt(settings: &Value, payload: &Value) -> Option<String> {
    payload_str(payload, "prompt")
        .or_else(|| payload_str(payload, "text"))
        .or_else(|| {
            let prompt = setting_str(settings, "prompt");
            (!prompt.is_empty()).then(|| prompt.to_string())
        })
}

#[async_trait]
impl ModuleHandler for OllamaHandler {
    fn verb(&self) -> &'static str {
        "generate"
    }

    fn prepare(&self, settings: &Value, payload: &Value) -> Result<Prepared, PortalError> {
        let base_url = setting_str(settings, "base_url");
        if base_url.is_empty() {
            return Err(PortalError::Config(
                "ollama module has no base_url configured".to_string(),
            ));
        }
        if resolve_prompt(settings, payload).is_none() {
            return Err(PortalError::Config(
                "no prompt: set payload.prompt, payload.text, or the module's default prompt"
                    .to_string(),
            ));
        }
        Ok(Prepared::single_attempt(Some(format!(
            "{}/api/generate",
            base_url.trim_end_matches('/')
        ))))
    }

    async fn execute(
        &self,
        settings: &Value,
        payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let base_url = setting_str(settings, "base_url").trim_end_matches('/').to_string();
        let model = payload_str(payload, "model")
            .unwrap_or_else(|| setting_str(settings, "model").to_string());
        let prompt = resolve_prompt(settings, payload).ok_or_else(|| {
            HandlerError::from(PortalError::Config("no prompt".to_string()))
        })?;

        let response = self
            .http
            .post(format!("{base_url}/api/generate"))
            .json(&json!({"model": model, "prompt": prompt, "stream": false}))
            .send()
            .await
            .map_err(|e| HandlerError::from(PortalError::transport("ollama request failed", e)))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            HandlerError::from(PortalError::transport("ollama response was not JSON", e))
        })?;
        if !status.is_success() {
            return Err(HandlerError::with_response(
                PortalError::Transport {
                    message: format!("ollama generate failed with status {status}"),
                    source: None,
                },
                i64::from(status.as_u16()),
                body.to_string(),
            ));
        }
        Ok(HandlerOutput::Success {
            response_status: Some(i64::from(status.as_u16())),
            response: body,
        })
    }
}
