// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos in config files
//! fail at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level portal configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// Portal identity and logging.
    #[serde(default)]
    pub portal: PortalSection,

    /// Gateway HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageSection,

    /// Required deployment secrets.
    #[serde(default)]
    pub security: SecuritySection,

    /// Outbound HTTP timeout budgets.
    #[serde(default)]
    pub http: HttpSection,
}

/// Portal identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortalSection {
    /// Display name used in system variables.
    #[serde(default = "default_portal_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Externally reachable base URL, used for tracking pixels and
    /// click-tracking link rewrites.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            name: default_portal_name(),
            log_level: default_log_level(),
            public_url: default_public_url(),
        }
    }
}

/// Gateway bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// SQLite storage settings.
///
/// When no database is configured (`DB_NAME` absent and no path set), the
/// portal falls back to a single local database file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Required deployment secrets.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    /// Session signing secret. Required.
    #[serde(default)]
    pub session_secret: String,

    /// Key used to encrypt TOTP seeds at rest. Required.
    #[serde(default)]
    pub totp_encryption_key: String,
}

impl std::fmt::Display for SecuritySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets never appear in logs.
        write!(
            f,
            "SecuritySection(session_secret={}, totp_encryption_key={})",
            if self.session_secret.is_empty() { "unset" } else { "set" },
            if self.totp_encryption_key.is_empty() { "unset" } else { "set" },
        )
    }
}

/// Outbound HTTP timeout budgets, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    /// Total request timeout for general outbound HTTP.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout for all outbound HTTP.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total request timeout for the SMS gateway.
    #[serde(default = "default_sms_timeout")]
    pub sms_timeout_secs: u64,

    /// SMTP session timeout.
    #[serde(default = "default_smtp_timeout")]
    pub smtp_timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            sms_timeout_secs: default_sms_timeout(),
            smtp_timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_portal_name() -> String {
    "MyPortal".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("myportal/myportal.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "myportal.db".to_string())
}

fn default_http_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_sms_timeout() -> u64 {
    10
}

fn default_smtp_timeout() -> u64 {
    30
}
