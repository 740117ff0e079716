// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattens a nested JSON context tree into `UPPER_SNAKE` token names.
//!
//! Two passes: a breadth-first work-list walk enumerates `(path, leaf)`
//! pairs, then stringification and alias expansion run over the flat list.
//! Owned JSON values cannot alias, so a depth guard stands in for cycle
//! detection; trees deeper than [`MAX_DEPTH`] are truncated with a warning.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use serde_json::Value;
use tracing::warn;

/// Maximum nesting depth before a subtree is dropped.
pub const MAX_DEPTH: usize = 32;

/// Flatten a context tree into `UPPER_SNAKE` tokens.
///
/// Path segments are uppercased, non-alphanumeric characters become `_`, and
/// segments join with `_`. Array elements contribute their index as a
/// segment. Null stringifies to `""`, booleans to `"true"`/`"false"`.
pub fn flatten_context(root: &Value) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    let mut queue: VecDeque<(String, usize, &Value)> = VecDeque::new();
    queue.push_back((String::new(), 0, root));

    while let Some((prefix, depth, node)) = queue.pop_front() {
        if depth > MAX_DEPTH {
            warn!(token_prefix = %prefix, "context tree exceeds depth limit, truncating");
            continue;
        }
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    queue.push_back((join(&prefix, key), depth + 1, child));
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    queue.push_back((join(&prefix, &index.to_string()), depth + 1, child));
                }
            }
            leaf => {
                if !prefix.is_empty() {
                    flat.insert(prefix, stringify(leaf));
                }
            }
        }
    }

    add_aliases(&mut flat);
    flat
}

fn join(prefix: &str, segment: &str) -> String {
    let normalized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if prefix.is_empty() {
        normalized
    } else {
        format!("{prefix}_{normalized}")
    }
}

fn stringify(leaf: &Value) -> String {
    match leaf {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // Containers are handled by the walk; unreachable here.
        other => other.to_string(),
    }
}

/// Keys ending in `_SUBJECT` gain a `_SUMMARY` alias and vice versa, unless
/// the alias already exists.
fn add_aliases(flat: &mut BTreeMap<String, String>) {
    let mut aliases = Vec::new();
    for (key, value) in flat.iter() {
        if let Some(stem) = key.strip_suffix("_SUBJECT") {
            aliases.push((format!("{stem}_SUMMARY"), value.clone()));
        } else if let Some(stem) = key.strip_suffix("_SUMMARY") {
            aliases.push((format!("{stem}_SUBJECT"), value.clone()));
        }
    }
    for (key, value) in aliases {
        flat.entry(key).or_insert(value);
    }
}
