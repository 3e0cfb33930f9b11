//! Background watch loop for mid-session display drift.
//!
//! Listens to the probe's signal feed (resize, ratio-keyed media query,
//! fullscreen changes) and polls the ratio on a fallback cadence, since no
//! single browser signal fires for every zoom pathway. Deviations warn or
//! terminate depending on the current policy.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::FidelityConfig;
use crate::host::{DisplayProbe, DisplaySignal, ScreenHost, SessionNotice};
use crate::models::{zoom_percent, TerminationCause, ZoomAudit};
use crate::session::{SessionEvent, TerminationHandle};

use super::monitor::FidelityPolicy;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_info, log_warn};

/// Drift evaluation against the approved baseline. Split from the loop so
/// the warn/terminate transitions are testable without a runtime.
pub(crate) struct RatioSentry {
    baseline: f64,
    drift_tolerance: f64,
    /// Last ratio a warning was raised for. Cleared when the ratio returns
    /// to baseline so the same deviation warns again after a recovery.
    last_warned: Option<f64>,
}

/// What the loop should do with one observed ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SentryAction {
    /// At baseline, or an already-warned deviation holding steady.
    Hold,
    Warn { current: f64, detected_zoom: f64 },
    Terminate { current: f64, detected_zoom: f64 },
}

impl RatioSentry {
    pub(crate) fn new(baseline: f64, drift_tolerance: f64) -> Self {
        Self {
            baseline,
            drift_tolerance,
            last_warned: None,
        }
    }

    pub(crate) fn observe(&mut self, current: f64, policy: FidelityPolicy) -> SentryAction {
        if (current - self.baseline).abs() <= self.drift_tolerance {
            self.last_warned = None;
            return SentryAction::Hold;
        }

        let detected_zoom = zoom_percent(current, self.baseline);
        match policy {
            FidelityPolicy::Warn => {
                if self.last_warned == Some(current) {
                    return SentryAction::Hold;
                }
                self.last_warned = Some(current);
                SentryAction::Warn {
                    current,
                    detected_zoom,
                }
            }
            FidelityPolicy::Terminate => SentryAction::Terminate {
                current,
                detected_zoom,
            },
        }
    }
}

pub(super) async fn fidelity_watch_loop(
    probe: Arc<dyn DisplayProbe>,
    config: FidelityConfig,
    audit: Arc<Mutex<ZoomAudit>>,
    host: Arc<dyn ScreenHost>,
    events: broadcast::Sender<SessionEvent>,
    policy_rx: watch::Receiver<FidelityPolicy>,
    termination: TerminationHandle,
    cancel_token: CancellationToken,
) {
    let baseline = match audit.lock().await.baseline() {
        Some(dpr) => dpr,
        None => {
            log_warn!("fidelity watch started without an approved baseline, exiting");
            return;
        }
    };

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut signals = probe.subscribe();
    let mut signals_open = true;

    probe.arm_ratio_watch(baseline);

    let mut sentry = RatioSentry::new(baseline, config.drift_tolerance);
    let mut reentry_prompt_up = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let action = sentry.observe(probe.device_pixel_ratio(), *policy_rx.borrow());
                if apply_action(action, &audit, &host, &events, &termination).await {
                    break;
                }
                sync_reentry_prompt(probe.is_fullscreen(), &mut reentry_prompt_up, &host);
            }
            signal = signals.recv(), if signals_open => {
                match signal {
                    Ok(signal @ (DisplaySignal::Resized | DisplaySignal::RatioWatchFired)) => {
                        let current = probe.device_pixel_ratio();
                        if signal == DisplaySignal::RatioWatchFired {
                            // The media query is keyed to the old ratio, so
                            // it has to be re-armed at the current one.
                            probe.arm_ratio_watch(current);
                        }
                        let action = sentry.observe(current, *policy_rx.borrow());
                        if apply_action(action, &audit, &host, &events, &termination).await {
                            break;
                        }
                    }
                    Ok(DisplaySignal::FullscreenChanged(fullscreen)) => {
                        sync_reentry_prompt(fullscreen, &mut reentry_prompt_up, &host);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log_warn!("display signal feed lagged, skipped {} signals", skipped);
                    }
                    Err(RecvError::Closed) => {
                        // Poll ticks keep drift detection alive without signals.
                        signals_open = false;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("fidelity watch shutting down");
                break;
            }
        }
    }
}

/// Apply a sentry verdict. Returns `true` when the session was terminated
/// and the loop should exit.
async fn apply_action(
    action: SentryAction,
    audit: &Arc<Mutex<ZoomAudit>>,
    host: &Arc<dyn ScreenHost>,
    events: &broadcast::Sender<SessionEvent>,
    termination: &TerminationHandle,
) -> bool {
    match action {
        SentryAction::Hold => false,
        SentryAction::Warn {
            current,
            detected_zoom,
        } => {
            audit.lock().await.record_deviation(current);
            log_warn!(
                "display ratio drifted to {:.4} ({:.0}% zoom), warning participant",
                current,
                detected_zoom
            );
            host.raise(SessionNotice::ZoomWarning { detected_zoom });
            let _ = events.send(SessionEvent::ZoomWarning { detected_zoom });
            false
        }
        SentryAction::Terminate {
            current,
            detected_zoom,
        } => {
            {
                let mut audit = audit.lock().await;
                audit.record_deviation(current);
                audit.terminated_due_to_zoom = true;
            }
            log_warn!(
                "display ratio drifted to {:.4} ({:.0}% zoom) in the main block, terminating",
                current,
                detected_zoom
            );
            termination.terminate(TerminationCause::FidelityViolation);
            true
        }
    }
}

/// Keep the fullscreen re-entry prompt in step with the reported state.
/// Leaving fullscreen never terminates; the participant is asked back in.
fn sync_reentry_prompt(fullscreen: bool, prompt_up: &mut bool, host: &Arc<dyn ScreenHost>) {
    if !fullscreen && !*prompt_up {
        *prompt_up = true;
        log_warn!("fullscreen left mid-session, prompting re-entry");
        host.raise(SessionNotice::FullscreenPrompt);
    } else if fullscreen && *prompt_up {
        *prompt_up = false;
        log_info!("fullscreen restored");
        host.raise(SessionNotice::FullscreenRestored);
    }
}
