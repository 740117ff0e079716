// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the MyPortal integration core.

use thiserror::Error;

/// The primary error type used across the integration core.
///
/// Configuration errors are raised synchronously from `trigger_module` and are
/// never recorded as failed webhook events; transport errors are recorded on
/// the originating event before surfacing.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Configuration errors (missing settings, invalid slug, bad field value).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound transport errors (HTTP status >= 400, network timeout, TLS).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// SMTP relay dispatch failures, distinct from provider API errors so the
    /// email pipeline's callers can record them without re-classifying.
    #[error("email dispatch error: {message}")]
    EmailDispatch {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No module row exists for the requested slug.
    #[error("module not configured: {slug}")]
    ModuleNotConfigured { slug: String },

    /// The slug names a module without a registered handler.
    #[error("no handler registered for module: {slug}")]
    HandlerNotFound { slug: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Wrap an arbitrary error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PortalError::Storage {
            source: Box::new(source),
        }
    }

    /// Wrap an arbitrary error as a transport failure with context.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PortalError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = PortalError::Config("missing api_key".into());
        assert_eq!(err.to_string(), "configuration error: missing api_key");
    }

    #[test]
    fn module_not_configured_carries_slug() {
        let err = PortalError::ModuleNotConfigured {
            slug: "ntfy".into(),
        };
        assert!(err.to_string().contains("ntfy"));
    }

    #[test]
    fn transport_helper_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err = PortalError::transport("POST failed", io);
        match err {
            PortalError::Transport { message, source } => {
                assert_eq!(message, "POST failed");
                assert!(source.is_some());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
