//! Display-fidelity controller: precondition evaluation, baseline capture,
//! and the lifecycle of the background watch loop.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::FidelityConfig;
use crate::host::{DisplayProbe, ScreenHost};
use crate::models::ZoomAudit;
use crate::session::{SessionEvent, TerminationHandle};

use super::watcher::fidelity_watch_loop;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_info, log_warn};

/// What the watch loop does with a detected deviation. Switched from
/// `Warn` to `Terminate` when practice ends, and never switched back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FidelityPolicy {
    Warn,
    Terminate,
}

/// One evaluation of the entry conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreconditionVerdict {
    pub fullscreen: bool,
    pub observed_dpr: f64,
    /// Scale bucket the ratio resolved to, `None` between buckets.
    pub bucket: Option<u32>,
}

impl PreconditionVerdict {
    pub fn passes(&self) -> bool {
        self.fullscreen && self.bucket.is_some()
    }
}

/// Owns the fidelity audit and the watch task. The engine drives it
/// through the session: precondition checks, then `initialize` to freeze
/// the baseline, `start` when the first screens come up, `escalate` when
/// practice ends, `stop` on the way out.
pub struct FidelityMonitor {
    probe: Arc<dyn DisplayProbe>,
    config: FidelityConfig,
    audit: Arc<Mutex<ZoomAudit>>,
    policy_tx: watch::Sender<FidelityPolicy>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl FidelityMonitor {
    pub fn new(probe: Arc<dyn DisplayProbe>, config: FidelityConfig) -> Self {
        let (policy_tx, _) = watch::channel(FidelityPolicy::Warn);
        Self {
            probe,
            config,
            audit: Arc::new(Mutex::new(ZoomAudit::new())),
            policy_tx,
            handle: None,
            cancel_token: None,
        }
    }

    /// Evaluate the entry conditions against the live display state.
    /// Reads only; recording an attempt or a bypass is separate.
    pub fn evaluate_precondition(&self) -> PreconditionVerdict {
        let observed_dpr = self.probe.device_pixel_ratio();
        let bucket =
            (self.config.scale_inference)(observed_dpr, self.config.precondition_tolerance);
        PreconditionVerdict {
            fullscreen: self.probe.is_fullscreen(),
            observed_dpr,
            bucket,
        }
    }

    /// Count one failed automatic re-check and return the new total.
    pub async fn note_attempt(&self) -> u32 {
        let mut audit = self.audit.lock().await;
        audit.zoom_check_attempts += 1;
        audit.zoom_check_attempts
    }

    /// Record that the participant took the manual bypass.
    pub async fn note_bypass(&self) {
        let mut audit = self.audit.lock().await;
        audit.zoom_check_bypassed = true;
        log_warn!(
            "precondition bypassed after {} failed checks",
            audit.zoom_check_attempts
        );
    }

    /// Freeze the live ratio as the approved baseline. Idempotent: the
    /// first call wins and later calls never move the baseline.
    pub async fn initialize(&self) {
        let dpr = self.probe.device_pixel_ratio();
        let mut audit = self.audit.lock().await;
        audit.approve(dpr);
        log_info!("approved display baseline {:?}", audit.baseline());
    }

    /// Spawn the watch loop under the `Warn` policy.
    pub async fn start(
        &mut self,
        host: Arc<dyn ScreenHost>,
        events: broadcast::Sender<SessionEvent>,
        termination: TerminationHandle,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("fidelity watch already active");
        }
        if self.audit.lock().await.baseline().is_none() {
            bail!("fidelity watch started before baseline approval");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(fidelity_watch_loop(
            Arc::clone(&self.probe),
            self.config.clone(),
            Arc::clone(&self.audit),
            host,
            events,
            self.policy_tx.subscribe(),
            termination,
            token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("fidelity watch started");
        Ok(())
    }

    /// Switch deviation handling from warnings to termination. One-way.
    pub fn escalate(&self) {
        let _ = self.policy_tx.send(FidelityPolicy::Terminate);
        log_info!("fidelity policy escalated: deviations now terminate");
    }

    /// Stop the watch loop and wait for it to wind down.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("fidelity watch task failed to join")?;
        }
        Ok(())
    }

    /// Copy of the audit as it stands, for export assembly.
    pub async fn audit_snapshot(&self) -> ZoomAudit {
        self.audit.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::host::{DisplaySignal, ScreenReply, ScreenRequest, SessionNotice};
    use crate::models::TerminationCause;

    struct StubProbe {
        dpr: StdMutex<f64>,
        fullscreen: AtomicBool,
        signals: broadcast::Sender<DisplaySignal>,
    }

    impl StubProbe {
        fn new(dpr: f64) -> Arc<Self> {
            let (signals, _) = broadcast::channel(16);
            Arc::new(Self {
                dpr: StdMutex::new(dpr),
                fullscreen: AtomicBool::new(true),
                signals,
            })
        }

        fn set_dpr(&self, dpr: f64) {
            *self.dpr.lock().unwrap() = dpr;
        }

        fn emit(&self, signal: DisplaySignal) {
            let _ = self.signals.send(signal);
        }
    }

    impl DisplayProbe for StubProbe {
        fn device_pixel_ratio(&self) -> f64 {
            *self.dpr.lock().unwrap()
        }

        fn is_fullscreen(&self) -> bool {
            self.fullscreen.load(Ordering::SeqCst)
        }

        fn subscribe(&self) -> broadcast::Receiver<DisplaySignal> {
            self.signals.subscribe()
        }

        fn arm_ratio_watch(&self, _ratio: f64) {}
    }

    #[derive(Default)]
    struct RecordingHost {
        notices: StdMutex<Vec<SessionNotice>>,
    }

    #[async_trait]
    impl ScreenHost for RecordingHost {
        async fn present(&self, _screen: ScreenRequest) -> ScreenReply {
            ScreenReply::Continue
        }

        fn raise(&self, notice: SessionNotice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    #[test]
    fn precondition_requires_fullscreen_and_a_bucket() {
        let probe = StubProbe::new(2.0);
        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());

        assert!(monitor.evaluate_precondition().passes());

        probe.set_dpr(1.25);
        let verdict = monitor.evaluate_precondition();
        assert_eq!(verdict.bucket, None);
        assert!(!verdict.passes());

        probe.set_dpr(2.0);
        probe.fullscreen.store(false, Ordering::SeqCst);
        let verdict = monitor.evaluate_precondition();
        assert_eq!(verdict.bucket, Some(2));
        assert!(!verdict.passes());
    }

    #[tokio::test]
    async fn initialize_freezes_the_first_ratio() {
        let probe = StubProbe::new(2.0);
        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());

        monitor.initialize().await;
        probe.set_dpr(2.5);
        monitor.initialize().await;

        assert_eq!(monitor.audit_snapshot().await.baseline(), Some(2.0));
    }

    #[tokio::test]
    async fn start_without_baseline_is_refused() {
        let probe = StubProbe::new(2.0);
        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let mut monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());

        let host: Arc<dyn ScreenHost> = Arc::new(RecordingHost::default());
        let (events, _) = broadcast::channel(32);
        let result = monitor.start(host, events, TerminationHandle::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn practice_deviation_warns_and_session_continues() {
        let probe = StubProbe::new(2.0);
        let host = Arc::new(RecordingHost::default());
        let (events, _) = broadcast::channel(32);
        let termination = TerminationHandle::new();

        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let host_dyn: Arc<dyn ScreenHost> = host.clone();
        let mut monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());
        monitor.initialize().await;
        monitor
            .start(host_dyn, events, termination.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        probe.set_dpr(2.5);
        probe.emit(DisplaySignal::Resized);
        tokio::time::sleep(Duration::from_millis(10)).await;
        // The same value again stays quiet.
        probe.emit(DisplaySignal::Resized);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!termination.is_terminated());
        let warnings = host
            .notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, SessionNotice::ZoomWarning { detected_zoom } if *detected_zoom == 125.0))
            .count();
        assert_eq!(warnings, 1);

        let audit = monitor.audit_snapshot().await;
        assert_eq!(audit.zoom_changes_count(), 1);
        assert!(!audit.terminated_due_to_zoom);

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn escalated_deviation_terminates_the_session() {
        let probe = StubProbe::new(2.0);
        let host = Arc::new(RecordingHost::default());
        let (events, _) = broadcast::channel(32);
        let termination = TerminationHandle::new();

        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let host_dyn: Arc<dyn ScreenHost> = host.clone();
        let mut monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());
        monitor.initialize().await;
        monitor
            .start(host_dyn, events, termination.clone())
            .await
            .unwrap();
        monitor.escalate();

        tokio::time::sleep(Duration::from_millis(10)).await;
        probe.set_dpr(2.5);
        probe.emit(DisplaySignal::RatioWatchFired);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            termination.cause(),
            Some(TerminationCause::FidelityViolation)
        );
        let audit = monitor.audit_snapshot().await;
        assert!(audit.terminated_due_to_zoom);
        assert_eq!(audit.zoom_changes_count(), 1);

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_fullscreen_prompts_but_never_terminates() {
        let probe = StubProbe::new(2.0);
        let host = Arc::new(RecordingHost::default());
        let (events, _) = broadcast::channel(32);
        let termination = TerminationHandle::new();

        let probe_dyn: Arc<dyn DisplayProbe> = probe.clone();
        let host_dyn: Arc<dyn ScreenHost> = host.clone();
        let mut monitor = FidelityMonitor::new(probe_dyn, FidelityConfig::default());
        monitor.initialize().await;
        monitor
            .start(host_dyn, events, termination.clone())
            .await
            .unwrap();
        monitor.escalate();

        tokio::time::sleep(Duration::from_millis(10)).await;
        probe.fullscreen.store(false, Ordering::SeqCst);
        probe.emit(DisplaySignal::FullscreenChanged(false));
        tokio::time::sleep(Duration::from_millis(10)).await;
        probe.fullscreen.store(true, Ordering::SeqCst);
        probe.emit(DisplaySignal::FullscreenChanged(true));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!termination.is_terminated());
        let notices = host.notices.lock().unwrap();
        assert!(notices.contains(&SessionNotice::FullscreenPrompt));
        assert!(notices.contains(&SessionNotice::FullscreenRestored));
        drop(notices);

        monitor.stop().await.unwrap();
    }
}
