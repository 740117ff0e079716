// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Hierarchy: compiled defaults < `/etc/myportal/myportal.toml` <
//! `~/.config/myportal/myportal.toml` < `./myportal.toml` < `MYPORTAL_*`
//! environment variables < bare deployment variables (`SESSION_SECRET`,
//! `TOTP_ENCRYPTION_KEY`, `DB_NAME`).

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without a wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PortalConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<PortalConfig, figment::Error> {
    base_figment().extract()
}

/// Load configuration from a TOML string only (defaults + string, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PortalConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PortalConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(bare_env_overrides())
        .extract()
}

fn base_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::file("/etc/myportal/myportal.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("myportal/myportal.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("myportal.toml"))
        .merge(env_provider())
        .merge(bare_env_overrides())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `MYPORTAL_SECURITY_SESSION_SECRET` must
/// map to `security.session_secret`, not `security.session.secret`.
fn env_provider() -> Env {
    Env::prefixed("MYPORTAL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("portal_", "portal.", 1)
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("security_", "security.", 1)
            .replacen("http_", "http.", 1);
        mapped.into()
    })
}

/// Overrides from the portal's historical bare environment variables.
///
/// `DB_NAME` names the database file; the other `DB_*` variables belong to
/// the server-backed deployment and are ignored here, which leaves the
/// single-file fallback in effect.
fn bare_env_overrides() -> Serialized<serde_json::Value> {
    let mut overrides = serde_json::Map::new();

    if let Ok(secret) = std::env::var("SESSION_SECRET")
        && !secret.is_empty()
    {
        overrides
            .entry("security")
            .or_insert_with(|| serde_json::json!({}))
            .as_object_mut()
            .map(|m| m.insert("session_secret".into(), secret.into()));
    }
    if let Ok(key) = std::env::var("TOTP_ENCRYPTION_KEY")
        && !key.is_empty()
    {
        overrides
            .entry("security")
            .or_insert_with(|| serde_json::json!({}))
            .as_object_mut()
            .map(|m| m.insert("totp_encryption_key".into(), key.into()));
    }
    if let Ok(name) = std::env::var("DB_NAME")
        && !name.is_empty()
    {
        overrides.insert(
            "storage".into(),
            serde_json::json!({ "database_path": format!("{name}.db") }),
        );
    }

    Serialized::defaults(serde_json::Value::Object(overrides))
}
