// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::time::Duration;

use myportal_core::PortalError;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::lock::MigrationLock;
use crate::migrations;

/// Timeout for the cross-process migration lock. Failure to acquire is fatal.
const MIGRATION_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Handle to the single-writer SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, run pending
    /// migrations under the migration lock, and configure PRAGMAs.
    pub async fn open(path: &str) -> Result<Self, PortalError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(PortalError::storage)?;
        }

        // Migrations run on a blocking thread behind the lock so that
        // horizontally scaled processes cannot race the schema.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), PortalError> {
            let _lock = MigrationLock::acquire(&migrate_path, MIGRATION_LOCK_TIMEOUT)?;
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(PortalError::storage)?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(PortalError::storage)?;
            migrations::run_migrations(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| PortalError::Internal(format!("migration task panicked: {e}")))??;
        debug!(path, "migrations applied");

        let conn = Connection::open(path).await.map_err(PortalError::storage)?;
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection. All query modules go
    /// through this handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the background connection thread.
    pub async fn close(self) -> Result<(), PortalError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Map tokio-rusqlite errors into the portal error taxonomy.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> PortalError {
    PortalError::Storage {
        source: Box::new(err),
    }
}

/// Current UTC timestamp in the storage layer's canonical format.
pub fn now_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("portal.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'webhook_events'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("portal.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open runs the migration runner again; refinery must treat
        // the applied migration as a no-op.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[test]
    fn now_utc_is_iso8601_zulu() {
        let ts = now_utc();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }
}
