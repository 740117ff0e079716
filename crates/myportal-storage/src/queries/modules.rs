// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module rows: enabled flag and raw (unredacted) settings JSON.
//!
//! Redaction happens above this layer, in the registry. Settings stored here
//! are the coerced raw values the dispatcher reads.

use myportal_core::PortalError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_utc};
use crate::models::ModuleRecord;

const MODULE_COLUMNS: &str =
    "slug, name, description, icon, enabled, settings, created_at, updated_at";

/// Insert a default module row if no row exists for the slug.
///
/// Never overwrites an existing row's enabled flag or settings.
pub async fn insert_default(
    db: &Database,
    slug: &str,
    name: &str,
    description: &str,
    icon: &str,
) -> Result<(), PortalError> {
    let slug = slug.to_string();
    let name = name.to_string();
    let description = description.to_string();
    let icon = icon.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO modules (slug, name, description, icon, enabled, settings)
                 VALUES (?1, ?2, ?3, ?4, 0, '{}')",
                params![slug, name, description, icon],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a single module by slug.
pub async fn get_module(db: &Database, slug: &str) -> Result<Option<ModuleRecord>, PortalError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MODULE_COLUMNS} FROM modules WHERE slug = ?1"
            ))?;
            match stmt.query_row(params![slug], map_module_row) {
                Ok(module) => Ok(Some(module)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List all modules ordered by slug.
pub async fn list_modules(db: &Database) -> Result<Vec<ModuleRecord>, PortalError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MODULE_COLUMNS} FROM modules ORDER BY slug ASC"
            ))?;
            let rows = stmt.query_map([], map_module_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Update the enabled flag and/or settings of a module.
pub async fn update_module(
    db: &Database,
    slug: &str,
    enabled: Option<bool>,
    settings: Option<serde_json::Value>,
) -> Result<(), PortalError> {
    let slug = slug.to_string();
    let updated_at = now_utc();
    db.connection()
        .call(move |conn| {
            if let Some(enabled) = enabled {
                conn.execute(
                    "UPDATE modules SET enabled = ?2, updated_at = ?3 WHERE slug = ?1",
                    params![slug, enabled, updated_at],
                )?;
            }
            if let Some(settings) = settings {
                conn.execute(
                    "UPDATE modules SET settings = ?2, updated_at = ?3 WHERE slug = ?1",
                    params![slug, settings.to_string(), updated_at],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn map_module_row(row: &rusqlite::Row<'_>) -> Result<ModuleRecord, rusqlite::Error> {
    let settings: String = row.get(5)?;
    Ok(ModuleRecord {
        slug: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        enabled: row.get(4)?,
        settings: serde_json::from_str(&settings)
            .unwrap_or_else(|_| serde_json::json!({})),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn insert_default_is_idempotent() {
        let (db, _dir) = setup_db().await;

        insert_default(&db, "ntfy", "ntfy", "Push notifications", "bell")
            .await
            .unwrap();
        update_module(&db, "ntfy", Some(true), Some(json!({"topic": "ops"})))
            .await
            .unwrap();

        // Re-seeding must not reset enabled or settings.
        insert_default(&db, "ntfy", "ntfy", "Push notifications", "bell")
            .await
            .unwrap();
        let module = get_module(&db, "ntfy").await.unwrap().unwrap();
        assert!(module.enabled);
        assert_eq!(module.settings["topic"], "ops");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_module_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_module(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_is_sorted_by_slug() {
        let (db, _dir) = setup_db().await;
        insert_default(&db, "xero", "Xero", "", "").await.unwrap();
        insert_default(&db, "ntfy", "ntfy", "", "").await.unwrap();

        let modules = list_modules(&db).await.unwrap();
        let slugs: Vec<&str> = modules.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["ntfy", "xero"]);

        db.close().await.unwrap();
    }
}
