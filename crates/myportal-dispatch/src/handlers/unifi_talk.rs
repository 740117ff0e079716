// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UniFi Talk call-recording sync handler.
//!
//! The SFTP download and catalog sync live behind [`RecordingSync`]; the
//! handler owns only the orchestration: download first, and skip the catalog
//! step entirely when nothing new arrived.

use std::sync::Arc;

use async_trait::async_trait;
use myportal_core::PortalError;
use serde_json::{Value, json};
use tracing::info;

use crate::handler::{HandlerError, HandlerOutput, ModuleHandler, Prepared, setting_str};

/// Recording collaborator seam.
#[async_trait]
pub trait RecordingSync: Send + Sync {
    /// Download new recordings from the PBX. Returns the downloaded file
    /// names.
    async fn download(&self, settings: &Value) -> Result<Vec<String>, PortalError>;

    /// Synchronize the local directory into the recordings catalog.
    /// Returns the number of catalog entries written.
    async fn sync_catalog(&self, local_path: &str) -> Result<u64, PortalError>;
}

/// Default collaborator for deployments without a PBX attachment: downloads
/// nothing, so every dispatch records a skip.
pub struct NoRecordingCollaborator;

#[async_trait]
impl RecordingSync for NoRecordingCollaborator {
    async fn download(&self, _settings: &Value) -> Result<Vec<String>, PortalError> {
        Ok(Vec::new())
    }

    async fn sync_catalog(&self, _local_path: &str) -> Result<u64, PortalError> {
        Ok(0)
    }
}

pub struct UnifiTalkHandler {
    recordings: Arc<dyn RecordingSync>,
}

impl UnifiTalkHandler {
    pub fn new(recordings: Arc<dyn RecordingSync>) -> Self {
        Self { recordings }
    }
}

#[async_trait]
impl ModuleHandler for UnifiTalkHandler {
    fn verb(&self) -> &'static str {
        "sync_recordings"
    }

    fn prepare(&self, settings: &Value, _payload: &Value) -> Result<Prepared, PortalError> {
        for key in ["host", "username", "password", "remote_path", "local_path"] {
            if setting_str(settings, key).is_empty() {
                return Err(PortalError::Config(format!(
                    "unifi-talk module has no {key} configured"
                )));
            }
        }
        Ok(Prepared::single_attempt(Some(format!(
            "sftp://{}{}",
            setting_str(settings, "host"),
            setting_str(settings, "remote_path"),
        ))))
    }

    async fn execute(
        &self,
        settings: &Value,
        _payload: &Value,
    ) -> Result<HandlerOutput, HandlerError> {
        let downloaded = self.recordings.download(settings).await?;
        if downloaded.is_empty() {
            return Ok(HandlerOutput::Skipped {
                reason: "no new recordings on the PBX".to_string(),
            });
        }

        let synced = self
            .recordings
            .sync_catalog(setting_str(settings, "local_path"))
            .await?;
        info!(downloaded = downloaded.len(), synced, "recordings synchronized");
        Ok(HandlerOutput::Success {
            response_status: None,
            response: json!({
                "downloaded": downloaded.len(),
                "files": downloaded,
                "catalog_entries": synced,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn settings() -> Value {
        json!({
            "host": "pbx.example.com", "username": "svc", "password": "p",
            "remote_path": "/recordings", "local_path": "/var/lib/myportal/recordings"
        })
    }

    struct FakeSync {
        files: Vec<String>,
        synced: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RecordingSync for FakeSync {
        async fn download(&self, _settings: &Value) -> Result<Vec<String>, PortalError> {
            Ok(self.files.clone())
        }

        async fn sync_catalog(&self, _local_path: &str) -> Result<u64, PortalError> {
            self.synced.store(true, Ordering::SeqCst);
            Ok(self.files.len() as u64)
        }
    }

    #[test]
    fn missing_settings_fail_prepare() {
        let handler = UnifiTalkHandler::new(Arc::new(NoRecordingCollaborator));
        let mut incomplete = settings();
        incomplete["remote_path"] = json!("");
        let err = handler.prepare(&incomplete, &json!({})).unwrap_err();
        assert!(err.to_string().contains("remote_path"));
    }

    #[tokio::test]
    async fn empty_download_skips_catalog_sync() {
        let synced = Arc::new(AtomicBool::new(false));
        let handler = UnifiTalkHandler::new(Arc::new(FakeSync {
            files: Vec::new(),
            synced: synced.clone(),
        }));

        let output = handler.execute(&settings(), &json!({})).await.unwrap();
        assert!(matches!(output, HandlerOutput::Skipped { .. }));
        assert!(!synced.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn downloads_then_syncs() {
        let synced = Arc::new(AtomicBool::new(false));
        let handler = UnifiTalkHandler::new(Arc::new(FakeSync {
            files: vec!["call-001.mp3".to_string(), "call-002.mp3".to_string()],
            synced: synced.clone(),
        }));

        let output = handler.execute(&settings(), &json!({})).await.unwrap();
        match output {
            HandlerOutput::Success { response, .. } => {
                assert_eq!(response["downloaded"], 2);
                assert_eq!(response["catalog_entries"], 2);
            }
            other => panic!("unexpected output: {other:?}"),
        }
        assert!(synced.load(Ordering::SeqCst));
    }
}
