// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-module settings coercion.
//!
//! `coerce` is a pure function over `(slug, incoming, existing)`: the result
//! contains exactly the keys enumerated for the slug, with defaults applied
//! for missing keys and unknown keys dropped. Secret merging happens here so
//! the preservation property is testable without storage.

use serde_json::{Map, Value};

use crate::secrets::{REDACTION_SENTINEL, sha256_hex};
use crate::slug::ModuleSlug;

/// How a settings field is normalized.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Free-form text with a default.
    Text { default: &'static str },
    /// Boolean accepting bool, number, and common string spellings.
    Bool { default: bool },
    /// List of strings, also accepted as one comma-separated string.
    List,
    /// Opaque secret stored raw; sentinel/empty means keep existing.
    Secret,
    /// Secret stored only as a SHA-256 hex digest under `hash_field`.
    HashedSecret { hash_field: &'static str },
}

/// One permitted settings field for a module.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
}

const fn text(key: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: FieldKind::Text { default },
    }
}

const fn boolean(key: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        key,
        kind: FieldKind::Bool { default },
    }
}

const fn list(key: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: FieldKind::List,
    }
}

const fn secret(key: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: FieldKind::Secret,
    }
}

const fn hashed(key: &'static str, hash_field: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: FieldKind::HashedSecret { hash_field },
    }
}

/// The permitted settings fields for each module slug.
pub fn field_specs(slug: ModuleSlug) -> Option<&'static [FieldSpec]> {
    // Inline const blocks promote each table to 'static.
    let specs: &'static [FieldSpec] = match slug {
        ModuleSlug::Ollama => const {
            &[
                text("base_url", "http://127.0.0.1:11434"),
                text("model", "llama3"),
                text("prompt", ""),
            ]
        },
        ModuleSlug::Smtp => const {
            &[
                text("from_address", ""),
                list("default_recipients"),
                text("subject_prefix", ""),
                text("smtp_host", ""),
                text("smtp_port", "587"),
                text("smtp_user", ""),
                secret("smtp_password"),
                boolean("use_starttls", true),
            ]
        },
        ModuleSlug::Smtp2go => const {
            &[
                secret("api_key"),
                text("smtp_user", ""),
                boolean("enable_tracking", false),
                secret("webhook_secret"),
            ]
        },
        ModuleSlug::TacticalRmm => const {
            &[
                text("base_url", ""),
                secret("api_key"),
                boolean("verify_ssl", true),
            ]
        },
        ModuleSlug::Ntfy => const {
            &[
                text("base_url", "https://ntfy.sh"),
                text("topic", ""),
                secret("auth_token"),
            ]
        },
        ModuleSlug::SmsGateway => const { &[text("gateway_url", ""), secret("authorization")] },
        ModuleSlug::UptimeKuma => const { &[hashed("shared_secret", "shared_secret_hash")] },
        ModuleSlug::ChatgptMcp => const {
            &[
                hashed("shared_secret", "shared_secret_hash"),
                list("allowed_actions"),
            ]
        },
        ModuleSlug::Xero => const {
            &[
                text("client_id", ""),
                secret("client_secret"),
                secret("refresh_token"),
                text("tenant_id", ""),
                text("default_hourly_rate", "0"),
                text("account_code", ""),
                text("tax_type", ""),
                text("line_amount_type", "Exclusive"),
            ]
        },
        ModuleSlug::CreateTicket | ModuleSlug::CreateTask => &[],
        ModuleSlug::UnifiTalk => const {
            &[
                text("host", ""),
                text("username", ""),
                secret("password"),
                text("remote_path", ""),
                text("local_path", ""),
            ]
        },
    };
    Some(specs)
}

/// Coerce a candidate settings object against the slug's field table.
///
/// `existing` is the previously persisted (raw, unredacted) settings object,
/// used to preserve secrets when the incoming value is the sentinel, empty,
/// or absent.
pub fn coerce(slug: ModuleSlug, incoming: &Value, existing: Option<&Value>) -> Value {
    let empty = Map::new();
    let incoming = incoming.as_object().unwrap_or(&empty);
    let existing = existing.and_then(Value::as_object).unwrap_or(&empty);

    let mut out = Map::new();
    for spec in field_specs(slug).unwrap_or(&[]) {
        match spec.kind {
            FieldKind::Text { default } => {
                let value = incoming
                    .get(spec.key)
                    .map(|v| coerce_text(v, default))
                    .or_else(|| existing.get(spec.key).and_then(|v| v.as_str().map(String::from)))
                    .unwrap_or_else(|| default.to_string());
                out.insert(spec.key.to_string(), Value::String(value));
            }
            FieldKind::Bool { default } => {
                let value = incoming
                    .get(spec.key)
                    .map(|v| coerce_bool(v, default))
                    .or_else(|| existing.get(spec.key).and_then(Value::as_bool))
                    .unwrap_or(default);
                out.insert(spec.key.to_string(), Value::Bool(value));
            }
            FieldKind::List => {
                let value = incoming
                    .get(spec.key)
                    .map(coerce_list)
                    .or_else(|| {
                        existing
                            .get(spec.key)
                            .filter(|v| v.is_array())
                            .map(coerce_list)
                    })
                    .unwrap_or_default();
                out.insert(
                    spec.key.to_string(),
                    Value::Array(value.into_iter().map(Value::String).collect()),
                );
            }
            FieldKind::Secret => {
                let value = merge_secret(
                    incoming.get(spec.key),
                    existing.get(spec.key).and_then(|v| v.as_str()),
                );
                out.insert(spec.key.to_string(), Value::String(value));
            }
            FieldKind::HashedSecret { hash_field } => {
                // A new plaintext under the base key is hashed; the plaintext
                // itself is never part of the coerced output.
                let hash = match incoming.get(spec.key).and_then(|v| v.as_str()) {
                    Some(plain) if !plain.is_empty() && plain != REDACTION_SENTINEL => {
                        sha256_hex(plain)
                    }
                    _ => merge_secret(
                        incoming.get(hash_field),
                        existing.get(hash_field).and_then(|v| v.as_str()),
                    ),
                };
                out.insert(hash_field.to_string(), Value::String(hash));
            }
        }
    }
    Value::Object(out)
}

fn coerce_text(value: &Value, default: &str) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Coerce a boolean from bool, number, or string spellings. String values
/// may carry an inline comment (`"true # enabled in prod"`); everything from
/// the first `#` is ignored before matching.
fn coerce_bool(value: &Value, default: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let stripped = s.split('#').next().unwrap_or("").trim().to_ascii_lowercase();
            match stripped.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            }
        }
        _ => default,
    }
}

/// Coerce a list of strings from an array or one comma-separated string.
/// Entries are trimmed and empties dropped.
fn coerce_list(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => s.split(',').map(String::from).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn merge_secret(incoming: Option<&Value>, existing: Option<&str>) -> String {
    match incoming.and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() && s != REDACTION_SENTINEL => s.to_string(),
        _ => existing.unwrap_or("").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::redact_settings;
    use serde_json::json;

    #[test]
    fn defaults_applied_and_unknown_keys_dropped() {
        let coerced = coerce(
            ModuleSlug::Ollama,
            &json!({"model": "mistral", "bogus": 1}),
            None,
        );
        assert_eq!(coerced["base_url"], "http://127.0.0.1:11434");
        assert_eq!(coerced["model"], "mistral");
        assert_eq!(coerced["prompt"], "");
        assert!(coerced.get("bogus").is_none());
    }

    #[test]
    fn bool_coercion_accepts_string_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            let coerced = coerce(ModuleSlug::Smtp2go, &json!({"enable_tracking": raw}), None);
            assert_eq!(coerced["enable_tracking"], true, "input {raw:?}");
        }
        for raw in ["0", "False", "no", "off"] {
            let coerced = coerce(ModuleSlug::TacticalRmm, &json!({"verify_ssl": raw}), None);
            assert_eq!(coerced["verify_ssl"], false, "input {raw:?}");
        }
    }

    #[test]
    fn bool_coercion_splits_inline_comments() {
        let coerced = coerce(
            ModuleSlug::Smtp2go,
            &json!({"enable_tracking": "true # rollout 2025-02"}),
            None,
        );
        assert_eq!(coerced["enable_tracking"], true);

        // Garbage after splitting falls back to the field default.
        let coerced = coerce(
            ModuleSlug::TacticalRmm,
            &json!({"verify_ssl": "# no value"}),
            None,
        );
        assert_eq!(coerced["verify_ssl"], true);
    }

    #[test]
    fn list_coercion_from_comma_separated_string() {
        let coerced = coerce(
            ModuleSlug::Smtp,
            &json!({"default_recipients": "ops@example.com, , helpdesk@example.com "}),
            None,
        );
        assert_eq!(
            coerced["default_recipients"],
            json!(["ops@example.com", "helpdesk@example.com"])
        );
    }

    #[test]
    fn secret_sentinel_and_empty_preserve_existing() {
        let existing = coerce(
            ModuleSlug::SmsGateway,
            &json!({"gateway_url": "https://old", "authorization": "Basic XYZ"}),
            None,
        );

        let coerced = coerce(
            ModuleSlug::SmsGateway,
            &json!({"gateway_url": "https://new", "authorization": REDACTION_SENTINEL}),
            Some(&existing),
        );
        assert_eq!(coerced["gateway_url"], "https://new");
        assert_eq!(coerced["authorization"], "Basic XYZ");

        let coerced = coerce(
            ModuleSlug::SmsGateway,
            &json!({"authorization": ""}),
            Some(&existing),
        );
        assert_eq!(coerced["authorization"], "Basic XYZ");
    }

    #[test]
    fn new_secret_value_replaces() {
        let existing = coerce(
            ModuleSlug::SmsGateway,
            &json!({"authorization": "Basic OLD"}),
            None,
        );
        let coerced = coerce(
            ModuleSlug::SmsGateway,
            &json!({"authorization": "Basic NEW"}),
            Some(&existing),
        );
        assert_eq!(coerced["authorization"], "Basic NEW");
    }

    #[test]
    fn shared_secret_is_hashed_never_stored() {
        let coerced = coerce(ModuleSlug::UptimeKuma, &json!({"shared_secret": "X"}), None);
        assert_eq!(coerced["shared_secret_hash"], sha256_hex("X"));
        assert!(coerced.get("shared_secret").is_none());
        assert!(!coerced.to_string().contains("\"X\""));
    }

    #[test]
    fn existing_hash_survives_sentinel_update() {
        let existing = coerce(ModuleSlug::UptimeKuma, &json!({"shared_secret": "X"}), None);
        let coerced = coerce(
            ModuleSlug::UptimeKuma,
            &json!({"shared_secret_hash": REDACTION_SENTINEL}),
            Some(&existing),
        );
        assert_eq!(coerced["shared_secret_hash"], sha256_hex("X"));
    }

    #[test]
    fn redacted_round_trip_is_noop() {
        // For every slug: updating with a fully redacted snapshot of the
        // coerced settings changes nothing.
        use strum::IntoEnumIterator;
        let seeds = json!({
            "api_key": "K", "webhook_secret": "W", "authorization": "A",
            "auth_token": "T", "client_secret": "C", "refresh_token": "R",
            "shared_secret": "S", "password": "P", "smtp_password": "SP",
            "base_url": "https://x", "gateway_url": "https://g",
            "enable_tracking": true, "verify_ssl": false,
            "default_recipients": ["a@b"], "allowed_actions": ["create"]
        });
        for slug in ModuleSlug::iter() {
            let persisted = coerce(slug, &seeds, None);
            let redacted = redact_settings(slug, &persisted);
            let round_tripped = coerce(slug, &redacted, Some(&persisted));
            assert_eq!(round_tripped, persisted, "slug {slug}");
        }
    }
}
