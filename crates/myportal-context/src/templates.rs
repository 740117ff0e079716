// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached message-template store.
//!
//! The in-process cache is authoritative between writes; every write path
//! refreshes or evicts the affected slug before returning.

use std::sync::LazyLock;

use dashmap::DashMap;
use myportal_core::{MessageTemplate, PortalError};
use myportal_storage::{Database, queries::templates};
use regex::Regex;
use tracing::debug;

use crate::interpolate::{interpolate, interpolate_html};

const MAX_SLUG_LEN: usize = 120;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._-]+$").unwrap_or_else(|e| panic!("slug regex: {e}"))
});

/// Template store backed by the database with a process-wide cache.
#[derive(Clone)]
pub struct TemplateStore {
    db: Database,
    cache: std::sync::Arc<DashMap<String, MessageTemplate>>,
}

impl TemplateStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: std::sync::Arc::new(DashMap::new()),
        }
    }

    fn validate_slug(slug: &str) -> Result<(), PortalError> {
        if slug.is_empty() || slug.len() > MAX_SLUG_LEN || !SLUG_RE.is_match(slug) {
            return Err(PortalError::Config(format!(
                "invalid template slug {slug:?}"
            )));
        }
        Ok(())
    }

    /// Create or replace a template, refreshing the cache entry.
    pub async fn upsert(
        &self,
        slug: &str,
        name: &str,
        description: Option<&str>,
        content_type: &str,
        content: &str,
    ) -> Result<MessageTemplate, PortalError> {
        Self::validate_slug(slug)?;
        if !matches!(content_type, "text/plain" | "text/html") {
            return Err(PortalError::Config(format!(
                "unsupported template content type {content_type:?}"
            )));
        }
        templates::upsert_template(&self.db, slug, name, description, content_type, content)
            .await?;
        let stored = templates::get_template(&self.db, slug)
            .await?
            .ok_or_else(|| PortalError::Internal(format!("template {slug} vanished after write")))?;
        self.cache.insert(slug.to_string(), stored.clone());
        debug!(template = slug, "template cached");
        Ok(stored)
    }

    /// Fetch a template, serving from cache when possible.
    pub async fn get(&self, slug: &str) -> Result<Option<MessageTemplate>, PortalError> {
        if let Some(cached) = self.cache.get(slug) {
            return Ok(Some(cached.clone()));
        }
        let stored = templates::get_template(&self.db, slug).await?;
        if let Some(template) = &stored {
            self.cache.insert(slug.to_string(), template.clone());
        }
        Ok(stored)
    }

    /// List templates straight from the database.
    pub async fn list(&self) -> Result<Vec<MessageTemplate>, PortalError> {
        templates::list_templates(&self.db).await
    }

    /// Delete a template and evict it from the cache.
    pub async fn delete(&self, slug: &str) -> Result<bool, PortalError> {
        let removed = templates::delete_template(&self.db, slug).await?;
        self.cache.remove(slug);
        Ok(removed)
    }

    /// Render a template with the given token map. HTML templates escape
    /// substituted values; plain-text templates substitute verbatim.
    pub async fn render(
        &self,
        slug: &str,
        tokens: &std::collections::BTreeMap<String, String>,
    ) -> Result<Option<String>, PortalError> {
        let Some(template) = self.get(slug).await? else {
            return Ok(None);
        };
        let rendered = if template.content_type == "text/html" {
            interpolate_html(&template.content, tokens)
        } else {
            interpolate(&template.content, tokens)
        };
        Ok(Some(rendered))
    }
}
