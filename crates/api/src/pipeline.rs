//! Per-frame flow: sample, classify, debounce, capture

use std::sync::Arc;
use std::time::{Duration, Instant};

use debounce::{GateDecision, PendingCapture};
use frame_codec::Frame;
use metrics::counter;
use storage::{ArtifactRef, ArtifactStore};
use tracing::{debug, error, info, warn};
use visibility::{Analysis, VisibilityVerdict};

use crate::dto::FrameReport;
use crate::AppState;

/// What happened to one submitted frame
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// Passed over by the sampler; not classified
    Skipped,
    Analyzed(FrameReport),
}

impl AppState {
    /// Decode and classify off the async runtime
    pub async fn classify(&self, payload: String) -> Analysis {
        let classifier = self.classifier.clone();
        match tokio::task::spawn_blocking(move || classifier.analyze_encoded(&payload)).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Classification task failed: {}", e);
                Analysis {
                    verdict: VisibilityVerdict::error(e.to_string()),
                    frame: None,
                }
            }
        }
    }

    /// Full pipeline for one frame of a subject
    pub async fn process_frame(&self, subject: &str, payload: String, force_process: bool) -> FrameOutcome {
        if !force_process && !self.monitor.admit(subject) {
            counter!("frames_skipped_total").increment(1);
            return FrameOutcome::Skipped;
        }

        let analysis = self.classify(payload).await;
        FrameOutcome::Analyzed(self.settle(subject, analysis, Instant::now()).await)
    }

    /// Feed a classified frame through the gate and write the artifact if granted.
    ///
    /// The write and the settling of its ticket run in their own task, so a
    /// caller that goes away mid-write cannot leave the subject stuck pending.
    pub async fn settle(&self, subject: &str, analysis: Analysis, now: Instant) -> FrameReport {
        let Analysis { verdict, frame } = analysis;

        counter!("frames_analyzed_total", "reason" => verdict.reason.label()).increment(1);
        info!(
            subject,
            reason = %verdict.reason,
            face_detected = verdict.face_detected,
            coverage = verdict.coverage,
            "Frame classified"
        );

        let decision = self.monitor.observe(subject, &verdict.reason, now);
        let mut report = FrameReport::new(verdict);

        if let GateDecision::Capture(ticket) = decision {
            let pending = self.monitor.hold(subject, ticket);
            let Some(frame) = frame else {
                debug!(subject, "No decoded frame to capture");
                pending.finish(false);
                return report;
            };

            let capture = tokio::spawn(capture(
                Arc::clone(&self.artifacts),
                pending,
                frame,
                self.write_timeout(),
            ));
            match capture.await {
                Ok(Some(artifact)) => {
                    report.frame_saved = true;
                    report.frame_path = Some(artifact.path);
                }
                Ok(None) => {}
                Err(e) => error!(subject, "Capture task failed: {}", e),
            }
        }

        report
    }

    fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.artifact_write_timeout_ms)
    }
}

/// Write the artifact and settle the ticket with the outcome
async fn capture(
    store: Arc<dyn ArtifactStore>,
    pending: PendingCapture,
    frame: Frame,
    limit: Duration,
) -> Option<ArtifactRef> {
    let saved = write_artifact(store, &pending, frame, limit).await;
    pending.finish(saved.is_some());
    saved
}

/// Bounded artifact write; the subject lock is not held here
async fn write_artifact(
    store: Arc<dyn ArtifactStore>,
    pending: &PendingCapture,
    frame: Frame,
    limit: Duration,
) -> Option<ArtifactRef> {
    let subject = pending.subject();
    let ticket = pending.ticket();
    let label = ticket.reason.label();

    let writer = Arc::clone(&store);
    let owner = subject.to_string();
    let reason = ticket.reason.clone();
    let mut write = tokio::task::spawn_blocking(move || writer.save(&owner, &reason, &frame));

    let failure = match tokio::time::timeout(limit, &mut write).await {
        Ok(Ok(Ok(artifact))) => {
            counter!("artifacts_saved_total", "reason" => label).increment(1);
            warn!(
                subject,
                reason = %ticket.reason,
                path = %artifact.path,
                "Captured anomaly frame after {:.1}s",
                ticket.persisted.as_secs_f64()
            );
            return Some(artifact);
        }
        Ok(Ok(Err(e))) => e.to_string(),
        Ok(Err(e)) => format!("write task failed: {}", e),
        Err(_) => {
            // The blocking write cannot be cancelled; drop its file once it lands
            tokio::spawn(discard_late_write(store, write));
            format!("write timed out after {:?}", limit)
        }
    };

    counter!("artifact_failures_total", "reason" => label).increment(1);
    error!(subject, reason = %ticket.reason, "Failed to save frame: {}", failure);
    None
}

async fn discard_late_write(
    store: Arc<dyn ArtifactStore>,
    write: tokio::task::JoinHandle<Result<ArtifactRef, storage::StorageError>>,
) {
    let Ok(Ok(artifact)) = write.await else {
        return;
    };
    let removed = tokio::task::spawn_blocking(move || {
        let result = store.remove(&artifact.subject, &artifact.filename);
        (artifact, result)
    })
    .await;

    match removed {
        Ok((artifact, Ok(()))) => debug!(path = %artifact.path, "Removed artifact written after timeout"),
        Ok((artifact, Err(e))) => error!(path = %artifact.path, "Failed to remove late artifact: {}", e),
        Err(e) => error!("Late artifact cleanup failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{test_settings, StubLocator};
    use std::path::Path;
    use storage::{ArtifactEntry, FsArtifactStore, StorageError};
    use visibility::{classify, Reason, VisibilityConfig};

    /// Filesystem store whose saves take a while
    struct SlowStore {
        inner: FsArtifactStore,
        delay: Duration,
    }

    impl ArtifactStore for SlowStore {
        fn save(&self, subject: &str, reason: &Reason, frame: &Frame) -> Result<ArtifactRef, StorageError> {
            std::thread::sleep(self.delay);
            self.inner.save(subject, reason, frame)
        }

        fn list(&self, subject: &str) -> Result<Vec<ArtifactEntry>, StorageError> {
            self.inner.list(subject)
        }

        fn read(&self, subject: &str, name: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.read(subject, name)
        }

        fn remove(&self, subject: &str, name: &str) -> Result<(), StorageError> {
            self.inner.remove(subject, name)
        }

        fn root(&self) -> &Path {
            self.inner.root()
        }
    }

    fn slow_state(dir: &tempfile::TempDir, delay_ms: u64, timeout_ms: u64) -> Arc<AppState> {
        let mut settings = test_settings(dir);
        settings.artifact_write_timeout_ms = timeout_ms;
        let store = SlowStore {
            inner: FsArtifactStore::new(&settings.suspicious_frames_dir).unwrap(),
            delay: Duration::from_millis(delay_ms),
        };
        Arc::new(AppState::with_store(settings, Arc::new(StubLocator), Arc::new(store)))
    }

    fn no_face() -> Analysis {
        let frame = Frame::new(vec![20; 200 * 100 * 3], 200, 100).unwrap();
        Analysis {
            verdict: classify(frame.geometry(), &[], &VisibilityConfig::default()),
            frame: Some(frame),
        }
    }

    #[tokio::test]
    async fn test_abandoned_request_still_settles_capture() {
        let dir = tempfile::tempdir().unwrap();
        let state = slow_state(&dir, 300, 2000);
        let t0 = Instant::now();

        state.settle("s-1", no_face(), t0).await;

        // Caller gives up while the write is in flight
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            state.settle("s-1", no_face(), t0 + Duration::from_millis(1)),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;

        let subject = state.monitor.subject_state("s-1").unwrap();
        assert!(!subject.capture_pending);
        assert!(subject.last_save_at.is_some());
        assert_eq!(state.artifacts.list("s-1").unwrap().len(), 1);

        let later = state
            .monitor
            .observe("s-1", &Reason::FaceNotDetected, t0 + Duration::from_secs(600));
        assert!(later.ticket().is_some());
    }

    #[tokio::test]
    async fn test_timed_out_write_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let state = slow_state(&dir, 300, 50);
        let t0 = Instant::now();

        state.settle("s-1", no_face(), t0).await;
        let report = state.settle("s-1", no_face(), t0 + Duration::from_millis(1)).await;
        assert!(report.cheating_detected);
        assert!(!report.frame_saved);
        assert!(report.frame_path.is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;

        let subject = state.monitor.subject_state("s-1").unwrap();
        assert!(!subject.capture_pending);
        assert_eq!(subject.last_save_at, None);
        assert!(state.artifacts.list("s-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecoded_frame_releases_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let state = slow_state(&dir, 0, 2000);
        let t0 = Instant::now();
        let invalid = || Analysis {
            verdict: VisibilityVerdict::invalid_frame(),
            frame: None,
        };

        state.settle("s-1", invalid(), t0).await;
        let report = state.settle("s-1", invalid(), t0 + Duration::from_millis(1)).await;
        assert!(!report.frame_saved);
        assert!(!state.monitor.subject_state("s-1").unwrap().capture_pending);
    }
}
