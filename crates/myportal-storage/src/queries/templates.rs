// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message template rows. The in-process cache lives in `myportal-context`.

use myportal_core::PortalError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_utc};
use crate::models::MessageTemplate;

/// Insert or replace a template.
pub async fn upsert_template(
    db: &Database,
    slug: &str,
    name: &str,
    description: Option<&str>,
    content_type: &str,
    content: &str,
) -> Result<(), PortalError> {
    let slug = slug.to_string();
    let name = name.to_string();
    let description = description.map(String::from);
    let content_type = content_type.to_string();
    let content = content.to_string();
    let updated_at = now_utc();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO message_templates (slug, name, description, content_type, content, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (slug) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     content_type = excluded.content_type,
                     content = excluded.content,
                     updated_at = excluded.updated_at",
                params![slug, name, description, content_type, content, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a template by slug.
pub async fn get_template(
    db: &Database,
    slug: &str,
) -> Result<Option<MessageTemplate>, PortalError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT slug, name, description, content_type, content, updated_at
                 FROM message_templates WHERE slug = ?1",
            )?;
            match stmt.query_row(params![slug], map_template_row) {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List all templates ordered by slug.
pub async fn list_templates(db: &Database) -> Result<Vec<MessageTemplate>, PortalError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT slug, name, description, content_type, content, updated_at
                 FROM message_templates ORDER BY slug ASC",
            )?;
            let rows = stmt.query_map([], map_template_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a template. Returns true when a row was removed.
pub async fn delete_template(db: &Database, slug: &str) -> Result<bool, PortalError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM message_templates WHERE slug = ?1",
                params![slug],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

fn map_template_row(row: &rusqlite::Row<'_>) -> Result<MessageTemplate, rusqlite::Error> {
    Ok(MessageTemplate {
        slug: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        content_type: row.get(3)?,
        content: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
