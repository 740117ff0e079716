// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System variables for template interpolation.
//!
//! Composed from three disjoint sources merged in order: static process
//! facts, a filtered environment snapshot, and runtime time tokens. The
//! environment filter is deny-by-substring: anything that smells like a
//! credential never becomes a token.

use std::collections::BTreeMap;

use chrono::{Local, Utc};

const BLOCKED_SUBSTRINGS: &[&str] = &["KEY", "SECRET", "TOKEN", "PASSWORD", "PASS", "PRIVATE"];
const BLOCKED_PREFIXES: &[&str] = &[
    "DB_", "REDIS_", "SMTP_", "AZURE_", "AWS_", "GOOGLE_", "OAUTH_", "SESSION_",
];

/// Build the system variable map.
pub fn system_variables(app_name: &str, public_url: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    // Static process facts.
    vars.insert("APP_NAME".to_string(), app_name.to_string());
    vars.insert(
        "APP_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    vars.insert("APP_PUBLIC_URL".to_string(), public_url.to_string());
    if let Ok(cwd) = std::env::current_dir() {
        vars.insert("APP_WORKING_DIR".to_string(), cwd.display().to_string());
    }
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        vars.insert("HOSTNAME".to_string(), hostname);
    }

    // Filtered environment snapshot. Merged second, so a hostile environment
    // cannot shadow the static facts above.
    for (name, value) in std::env::vars() {
        if env_allowed(&name) {
            vars.entry(format!("ENV_{name}")).or_insert(value);
        }
    }

    // Runtime snapshot.
    let utc = Utc::now();
    let local = Local::now();
    vars.insert(
        "NOW_UTC".to_string(),
        utc.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    );
    vars.insert("TODAY_UTC".to_string(), utc.format("%Y-%m-%d").to_string());
    vars.insert(
        "NOW_LOCAL".to_string(),
        local.format("%Y-%m-%d %H:%M:%S").to_string(),
    );

    vars
}

fn env_allowed(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if BLOCKED_SUBSTRINGS.iter().any(|s| upper.contains(s)) {
        return false;
    }
    !BLOCKED_PREFIXES.iter().any(|p| upper.starts_with(p))
}
