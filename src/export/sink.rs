//! Payload delivery: primary sink submission with a local JSON fallback
//! when the submission errors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::host::ExportSink;
use crate::models::ExportStatus;

use super::payload::ExportPayload;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Submit the payload, falling back to a local file if the sink errors.
/// Export failure is degraded, not fatal: the session already ended and
/// the caller only records the outcome in the summary.
pub async fn resolve_export(
    sink: &dyn ExportSink,
    payload: &ExportPayload,
    fallback: Option<&Path>,
) -> ExportStatus {
    match sink.submit(payload).await {
        Ok(()) => {
            log_info!(
                "export submitted for session {} ({})",
                payload.participant_id,
                payload.experiment
            );
            ExportStatus::Submitted
        }
        Err(err) => {
            log_error!(
                "export submission failed for session {}: {:#}",
                payload.participant_id,
                err
            );
            match fallback {
                Some(path) => match write_fallback(payload, path) {
                    Ok(()) => {
                        log_warn!("export saved to fallback file {}", path.display());
                        ExportStatus::FallbackSaved
                    }
                    Err(err) => {
                        log_error!("fallback save failed: {:#}", err);
                        ExportStatus::Failed
                    }
                },
                None => ExportStatus::Failed,
            }
        }
    }
}

fn write_fallback(payload: &ExportPayload, path: &Path) -> Result<()> {
    let serialized = serde_json::to_string_pretty(payload)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write export fallback to {}", path.display()))
}

/// Sink that writes each payload to a local JSON file. The default when
/// no remote record service is configured.
pub struct FileExportSink {
    path: PathBuf,
}

impl FileExportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    async fn submit(&self, payload: &ExportPayload) -> Result<()> {
        write_fallback(payload, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use crate::export::payload::ZoomTracking;
    use crate::models::ZoomAudit;

    struct FailingSink;

    #[async_trait]
    impl ExportSink for FailingSink {
        async fn submit(&self, _payload: &ExportPayload) -> Result<()> {
            anyhow::bail!("record service unreachable")
        }
    }

    struct CountingSink {
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl ExportSink for CountingSink {
        async fn submit(&self, _payload: &ExportPayload) -> Result<()> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn payload() -> ExportPayload {
        ExportPayload {
            experiment: "face_trials".to_string(),
            participant_id: "p-1".to_string(),
            timestamp: Utc::now(),
            demographics: Default::default(),
            zoom_tracking: ZoomTracking::from(ZoomAudit::new()),
            trials: Some(Vec::new()),
            rounds: None,
        }
    }

    #[tokio::test]
    async fn successful_submission_reports_submitted() {
        let sink = CountingSink {
            submissions: AtomicUsize::new(0),
        };
        let status = resolve_export(&sink, &payload(), None).await;
        assert_eq!(status, ExportStatus::Submitted);
        assert_eq!(sink.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_submission_without_fallback_reports_failed() {
        let status = resolve_export(&FailingSink, &payload(), None).await;
        assert_eq!(status, ExportStatus::Failed);
    }

    #[tokio::test]
    async fn failed_submission_lands_in_the_fallback_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let status = resolve_export(&FailingSink, &payload(), Some(&path)).await;
        assert_eq!(status, ExportStatus::FallbackSaved);

        let saved: ExportPayload =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.experiment, "face_trials");
        assert_eq!(saved.trials.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn file_sink_round_trips_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let sink = FileExportSink::new(&path);
        sink.submit(&payload()).await.unwrap();

        let saved: ExportPayload =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.participant_id, "p-1");
    }

    #[tokio::test]
    async fn repeated_submission_produces_independent_records() {
        let sink = CountingSink {
            submissions: AtomicUsize::new(0),
        };
        let body = payload();
        assert_eq!(
            resolve_export(&sink, &body, None).await,
            ExportStatus::Submitted
        );
        assert_eq!(
            resolve_export(&sink, &body, None).await,
            ExportStatus::Submitted
        );
        assert_eq!(sink.submissions.load(Ordering::SeqCst), 2);
    }
}
