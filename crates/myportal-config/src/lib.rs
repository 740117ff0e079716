// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the MyPortal integration core.
//!
//! Layered loading via Figment: compiled defaults, then a TOML file, then
//! `MYPORTAL_*` environment variables. The deployment environment's bare
//! `SESSION_SECRET`, `TOTP_ENCRYPTION_KEY`, and `DB_NAME` variables are
//! honored on top for compatibility with the portal's existing systemd units.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PortalConfig;

use myportal_core::PortalError;

/// Load configuration from the standard hierarchy and validate required
/// fields. `SESSION_SECRET` and `TOTP_ENCRYPTION_KEY` must be present.
pub fn load_and_validate() -> Result<PortalConfig, PortalError> {
    let config = load_config().map_err(|e| PortalError::Config(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Validate a loaded configuration.
pub fn validate(config: &PortalConfig) -> Result<(), PortalError> {
    if config.security.session_secret.is_empty() {
        return Err(PortalError::Config(
            "SESSION_SECRET is required (set MYPORTAL_SECURITY_SESSION_SECRET or SESSION_SECRET)"
                .into(),
        ));
    }
    if config.security.totp_encryption_key.is_empty() {
        return Err(PortalError::Config(
            "TOTP_ENCRYPTION_KEY is required (set MYPORTAL_SECURITY_TOTP_ENCRYPTION_KEY or TOTP_ENCRYPTION_KEY)"
                .into(),
        ));
    }
    if config.server.port == 0 {
        return Err(PortalError::Config("server.port must be non-zero".into()));
    }
    Ok(())
}
