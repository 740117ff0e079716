// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent module registry with redaction at the read boundary.

use myportal_core::PortalError;
use myportal_storage::{Database, ModuleRecord, queries::modules};
use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::coerce::coerce;
use crate::secrets::redact_settings;
use crate::slug::ModuleSlug;

/// Registry over the `modules` table. All read paths redact secrets; the
/// dispatcher fetches raw settings through [`ModuleRegistry::raw_settings`].
#[derive(Clone)]
pub struct ModuleRegistry {
    db: Database,
}

impl ModuleRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Seed a disabled default row for every known slug. Existing rows are
    /// left untouched, so this is safe to run on every startup.
    pub async fn ensure_defaults(&self) -> Result<(), PortalError> {
        for slug in ModuleSlug::iter() {
            let (name, description, icon) = slug.descriptor();
            modules::insert_default(&self.db, &slug.to_string(), name, description, icon).await?;
        }
        debug!(count = ModuleSlug::iter().count(), "module defaults seeded");
        Ok(())
    }

    /// List all modules with secrets redacted.
    pub async fn list_modules(&self) -> Result<Vec<ModuleRecord>, PortalError> {
        let mut records = modules::list_modules(&self.db).await?;
        for record in &mut records {
            if let Ok(slug) = record.slug.parse::<ModuleSlug>() {
                record.settings = redact_settings(slug, &record.settings);
            }
        }
        Ok(records)
    }

    /// Fetch one module with secrets redacted.
    pub async fn get_module(&self, slug: ModuleSlug) -> Result<Option<ModuleRecord>, PortalError> {
        let record = modules::get_module(&self.db, &slug.to_string()).await?;
        Ok(record.map(|mut r| {
            r.settings = redact_settings(slug, &r.settings);
            r
        }))
    }

    /// Update a module's enabled flag and/or settings.
    ///
    /// Incoming settings are coerced against the stored raw settings so
    /// sentinel-valued secrets preserve the persisted values. Returns the
    /// updated record, redacted.
    pub async fn update_module(
        &self,
        slug: ModuleSlug,
        enabled: Option<bool>,
        settings: Option<&Value>,
    ) -> Result<ModuleRecord, PortalError> {
        let existing = modules::get_module(&self.db, &slug.to_string())
            .await?
            .ok_or_else(|| PortalError::ModuleNotConfigured {
                slug: slug.to_string(),
            })?;

        let coerced = settings.map(|incoming| coerce(slug, incoming, Some(&existing.settings)));
        modules::update_module(&self.db, &slug.to_string(), enabled, coerced).await?;
        info!(
            module = %slug,
            enabled_changed = enabled.is_some(),
            settings_changed = settings.is_some(),
            "module updated"
        );

        let updated = modules::get_module(&self.db, &slug.to_string())
            .await?
            .ok_or_else(|| PortalError::Internal(format!("module {slug} vanished during update")))?;
        Ok(ModuleRecord {
            settings: redact_settings(slug, &updated.settings),
            ..updated
        })
    }

    /// Raw, coerced settings for the dispatcher. Also reports the enabled
    /// flag so callers can short-circuit disabled modules.
    pub async fn raw_settings(&self, slug: ModuleSlug) -> Result<(bool, Value), PortalError> {
        let record = modules::get_module(&self.db, &slug.to_string())
            .await?
            .ok_or_else(|| PortalError::ModuleNotConfigured {
                slug: slug.to_string(),
            })?;
        let coerced = coerce(slug, &record.settings, None);
        Ok((record.enabled, coerced))
    }
}
