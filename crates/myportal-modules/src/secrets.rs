// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction and hashing.
//!
//! Secret values appear in API responses only as the redaction sentinel.
//! On writes the sentinel (or an empty string) means "keep existing".

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::coerce::{FieldKind, field_specs};
use crate::slug::ModuleSlug;

/// The literal that stands in for a stored secret on reads, and means
/// "keep existing" on writes.
pub const REDACTION_SENTINEL: &str = "********";

/// Lowercase hex SHA-256 digest of a secret string.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Replace every non-empty secret value in a settings object with the
/// sentinel. Hash fields are redacted too: a stored digest still permits
/// offline guessing of the shared secret.
pub fn redact_settings(slug: ModuleSlug, settings: &Value) -> Value {
    let Some(specs) = field_specs(slug) else {
        return settings.clone();
    };
    let mut redacted = settings.as_object().cloned().unwrap_or_default();
    for spec in specs {
        let key = match spec.kind {
            FieldKind::Secret => spec.key,
            FieldKind::HashedSecret { hash_field } => hash_field,
            _ => continue,
        };
        if let Some(value) = redacted.get_mut(key)
            && value.as_str().is_some_and(|s| !s.is_empty())
        {
            *value = Value::String(REDACTION_SENTINEL.to_string());
        }
    }
    Value::Object(redacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("X"),
            "4b68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015"
        );
    }

    #[test]
    fn redacts_secret_fields_only() {
        let settings = json!({
            "gateway_url": "https://sms.example.com",
            "authorization": "Basic XYZ"
        });
        let redacted = redact_settings(ModuleSlug::SmsGateway, &settings);
        assert_eq!(redacted["gateway_url"], "https://sms.example.com");
        assert_eq!(redacted["authorization"], REDACTION_SENTINEL);
    }

    #[test]
    fn empty_secret_stays_empty() {
        let settings = json!({"gateway_url": "", "authorization": ""});
        let redacted = redact_settings(ModuleSlug::SmsGateway, &settings);
        assert_eq!(redacted["authorization"], "");
    }

    #[test]
    fn hash_fields_are_redacted() {
        let settings = json!({"shared_secret_hash": sha256_hex("top")});
        let redacted = redact_settings(ModuleSlug::UptimeKuma, &settings);
        assert_eq!(redacted["shared_secret_hash"], REDACTION_SENTINEL);
    }
}
