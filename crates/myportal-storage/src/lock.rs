// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process migration lock.
//!
//! Schema migration must have a single writer even when the portal runs as
//! several horizontally scaled processes sharing one database file. The lock
//! is an exclusively created file named after the database; a holder that
//! died leaves a stale file which is taken over once its age exceeds
//! `STALE_AFTER`. A waiter whose budget runs out while the file is fresh
//! gets a timeout error instead of stealing a live holder's lock.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use myportal_core::PortalError;
use tracing::warn;

/// Poll interval while waiting for a contended lock.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Age past which a lock file is considered abandoned by a dead holder.
/// Must stay well above any caller's wait budget so an impatient waiter
/// never steals the lock from a live migration.
const STALE_AFTER: Duration = Duration::from_secs(300);

/// Held migration lock. Released on drop.
#[derive(Debug)]
pub struct MigrationLock {
    path: PathBuf,
}

impl MigrationLock {
    /// Acquire the migration lock for the database at `db_path`, waiting up
    /// to `timeout`. Failure to acquire is fatal to startup.
    pub fn acquire(db_path: &str, timeout: Duration) -> Result<Self, PortalError> {
        let path = PathBuf::from(format!("{db_path}.migrate.lock"));
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!(lock = %path.display(), "removing stale migration lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(PortalError::Timeout { duration: timeout });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(PortalError::storage(e)),
            }
        }
    }
}

fn is_stale(path: &PathBuf) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_AFTER)
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
