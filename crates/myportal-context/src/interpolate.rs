// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{TOKEN}}` substitution over flattened context maps.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap_or_else(|e| panic!("token regex: {e}"))
});

/// Replace `{{TOKEN}}` occurrences with values from `tokens`. Unknown tokens
/// are replaced with the empty string.
pub fn interpolate(template: &str, tokens: &BTreeMap<String, String>) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            tokens.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Like [`interpolate`] but HTML-escapes each substituted value, so context
/// strings cannot inject markup into an HTML template.
pub fn interpolate_html(template: &str, tokens: &BTreeMap<String, String>) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            tokens
                .get(&caps[1])
                .map(|v| html_escape(v))
                .unwrap_or_default()
        })
        .into_owned()
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
