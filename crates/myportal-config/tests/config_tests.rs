// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the MyPortal configuration system.

use myportal_config::model::PortalConfig;
use myportal_config::{load_config_from_str, validate};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_portal_config() {
    let toml = r#"
[portal]
name = "test-portal"
log_level = "debug"
public_url = "https://portal.example.com"

[server]
host = "0.0.0.0"
port = 9090

[storage]
database_path = "/tmp/portal-test.db"

[security]
session_secret = "abc"
totp_encryption_key = "def"

[http]
timeout_secs = 20
connect_timeout_secs = 3
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.portal.name, "test-portal");
    assert_eq!(config.portal.log_level, "debug");
    assert_eq!(config.portal.public_url, "https://portal.example.com");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.storage.database_path, "/tmp/portal-test.db");
    assert_eq!(config.http.timeout_secs, 20);
    assert_eq!(config.http.connect_timeout_secs, 3);
    // Unset sections keep their defaults.
    assert_eq!(config.http.sms_timeout_secs, 10);
    assert_eq!(config.http.smtp_timeout_secs, 30);
}

/// Unknown field produces an error instead of being silently dropped.
#[test]
fn unknown_field_produces_error() {
    let toml = r#"
[server]
hosst = "0.0.0.0"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("hosst"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Empty TOML yields full defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    let defaults = PortalConfig::default();
    assert_eq!(config.server.port, defaults.server.port);
    assert_eq!(config.portal.name, defaults.portal.name);
}

/// Validation requires the deployment secrets.
#[test]
fn validate_requires_session_secret() {
    let config = load_config_from_str("").unwrap();
    let err = validate(&config).expect_err("missing secrets should fail validation");
    assert!(err.to_string().contains("SESSION_SECRET"));
}

#[test]
fn validate_requires_totp_key() {
    let toml = r#"
[security]
session_secret = "abc"
"#;
    let config = load_config_from_str(toml).unwrap();
    let err = validate(&config).expect_err("missing TOTP key should fail validation");
    assert!(err.to_string().contains("TOTP_ENCRYPTION_KEY"));
}

#[test]
fn validate_accepts_complete_config() {
    let toml = r#"
[security]
session_secret = "abc"
totp_encryption_key = "def"
"#;
    let config = load_config_from_str(toml).unwrap();
    validate(&config).expect("complete config should validate");
}
