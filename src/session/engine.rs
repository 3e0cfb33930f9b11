//! The session engine: drives the experiment timeline from preload to
//! export, delegating rendering to the host, fidelity to the monitor, and
//! block construction to the sequencer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

use crate::config::EngineConfig;
use crate::export::{build_payload, resolve_export};
use crate::fidelity::FidelityMonitor;
use crate::host::{
    DisplayProbe, ExportSink, PreconditionAction, ScreenHost, ScreenReply, ScreenRequest,
    SessionNotice, StaticPage,
};
use crate::models::{
    ExportStatus, MeasureDim, PresentationSpec, PromptKind, SessionPhase, SessionSummary,
    TerminationCause,
};
use crate::sequencer::{
    build_block, build_script, record_outcome, RecordedAnswer, ResponseLedger, ScreenStep,
};

use super::events::SessionEvent;
use super::state::{SessionState, TerminationHandle};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_info, log_warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One participant's session. Construct, optionally `subscribe`, then
/// `run` to completion; the engine is consumed by the run.
pub struct SessionEngine {
    config: EngineConfig,
    host: Arc<dyn ScreenHost>,
    sink: Arc<dyn ExportSink>,
    monitor: FidelityMonitor,
    state: SessionState,
    events: broadcast::Sender<SessionEvent>,
    termination: TerminationHandle,
    rng: StdRng,
}

impl SessionEngine {
    pub fn new(
        config: EngineConfig,
        probe: Arc<dyn DisplayProbe>,
        host: Arc<dyn ScreenHost>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let monitor = FidelityMonitor::new(probe, config.fidelity.clone());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            host,
            sink,
            monitor,
            state: SessionState::new(),
            events,
            termination: TerminationHandle::new(),
            rng,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.state.id
    }

    /// Subscribe to the progress event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Drive the session to its end and return the summary. Termination
    /// (fidelity violation, consent decline) is a normal resolution, not
    /// an error; `Err` means a configuration or task failure.
    pub async fn run(mut self) -> Result<SessionSummary> {
        log_info!(
            "session {} starting ({})",
            self.state.id,
            self.config.design.tag()
        );

        let export = match self.drive().await {
            Ok(Some(status)) => status,
            Ok(None) => self.terminated_epilogue().await?,
            Err(err) => {
                let _ = self.monitor.stop().await;
                return Err(err);
            }
        };

        let summary = SessionSummary {
            id: self.state.id.clone(),
            started_at: self.state.started_at,
            ended_at: Utc::now(),
            final_phase: self.state.phase(),
            completed_practice: self.state.completed_practice(),
            completed_main: self.state.completed_main(),
            terminated_for: self.termination.cause(),
            export,
        };
        log_info!(
            "session {} ended in {} with {} main presentations, export {}",
            summary.id,
            summary.final_phase.as_str(),
            summary.completed_main,
            summary.export.as_str()
        );
        Ok(summary)
    }

    /// The linear timeline. Resolves to `None` as soon as a termination
    /// lands, at which point the epilogue takes over.
    async fn drive(&mut self) -> Result<Option<ExportStatus>> {
        if !self.show(SessionPhase::Preload, StaticPage::Preload).await {
            return Ok(None);
        }
        if !self
            .show(SessionPhase::PreconditionIntro, StaticPage::PreconditionIntro)
            .await
        {
            return Ok(None);
        }
        // The fullscreen request needs a participant gesture, so it rides
        // on this screen's continue action host-side.
        if !self
            .show(SessionPhase::EnterFullscreen, StaticPage::EnterFullscreen)
            .await
        {
            return Ok(None);
        }

        if !self.precondition_loop().await {
            return Ok(None);
        }

        self.enter(SessionPhase::MonitorInit);
        self.monitor.initialize().await;
        self.monitor
            .start(
                Arc::clone(&self.host),
                self.events.clone(),
                self.termination.clone(),
            )
            .await?;

        if !self.show(SessionPhase::Welcome, StaticPage::Welcome).await {
            return Ok(None);
        }
        if !self.consent().await {
            return Ok(None);
        }
        if !self.demographics().await {
            return Ok(None);
        }
        if !self
            .show(SessionPhase::Instructions, StaticPage::Instructions)
            .await
        {
            return Ok(None);
        }
        if !self
            .show(SessionPhase::PracticeIntro, StaticPage::PracticeIntro)
            .await
        {
            return Ok(None);
        }

        self.enter(SessionPhase::Practice);
        let practice = build_block(&self.config.design, true, &mut self.rng)?;
        for spec in practice {
            if !self.run_presentation(spec).await {
                return Ok(None);
            }
        }

        if !self.end_practice_mode().await {
            return Ok(None);
        }

        self.enter(SessionPhase::MainBlock);
        let main = build_block(&self.config.design, false, &mut self.rng)?;
        for spec in main {
            if !self.run_presentation(spec).await {
                return Ok(None);
            }
        }

        // Every stimulus is delivered; a zoom during debrief can no longer
        // spoil the dataset.
        self.monitor.stop().await?;

        if !self.show(SessionPhase::Debrief, StaticPage::Debrief).await {
            return Ok(None);
        }

        self.enter(SessionPhase::Export);
        let status = self.export().await;

        self.enter(SessionPhase::Closed);
        self.host.raise(SessionNotice::Completed);
        Ok(Some(status))
    }

    /// Wind down after a termination: the explanatory overlay always goes
    /// up, and a fidelity violation still ships the partial dataset so the
    /// flagged audit reaches the researcher. A consent decline ships
    /// nothing.
    async fn terminated_epilogue(&mut self) -> Result<ExportStatus> {
        self.enter(SessionPhase::Terminated);
        self.monitor.stop().await?;

        // The cancel signal only fires with a cause recorded; default to
        // the data-preserving branch should that invariant ever break.
        let cause = self
            .termination
            .cause()
            .unwrap_or(TerminationCause::FidelityViolation);
        log_info!(
            "session {} terminated: {}",
            self.state.id,
            cause.as_str()
        );

        self.host.raise(SessionNotice::Terminated { cause });
        let _ = self.events.send(SessionEvent::Terminated { cause });

        let status = match cause {
            TerminationCause::FidelityViolation => self.export().await,
            TerminationCause::ConsentDeclined => {
                let status = ExportStatus::Skipped;
                let _ = self.events.send(SessionEvent::ExportResolved { status });
                status
            }
        };
        Ok(status)
    }

    fn enter(&mut self, phase: SessionPhase) {
        self.state.set_phase(phase);
        let _ = self.events.send(SessionEvent::PhaseChanged {
            phase: self.state.phase(),
        });
    }

    /// Present a screen unless the session has ended; a termination landing
    /// mid-screen drops the in-flight future and resolves to `None`.
    async fn present_checked(&self, screen: ScreenRequest) -> Option<ScreenReply> {
        if self.termination.is_terminated() {
            return None;
        }
        tokio::select! {
            reply = self.host.present(screen) => Some(reply),
            _ = self.termination.token().cancelled() => None,
        }
    }

    async fn show(&mut self, phase: SessionPhase, page: StaticPage) -> bool {
        self.enter(phase);
        self.present_checked(ScreenRequest::Static { page })
            .await
            .is_some()
    }

    /// Re-check entry conditions until they pass or the participant takes
    /// the offered bypass. The loop itself never ends a session.
    async fn precondition_loop(&mut self) -> bool {
        self.enter(SessionPhase::PreconditionLoop);
        loop {
            let verdict = self.monitor.evaluate_precondition();
            if verdict.passes() {
                return true;
            }

            let attempts = self.monitor.note_attempt().await;
            let bypass_offered =
                verdict.fullscreen && attempts >= self.config.fidelity.min_bypass_attempts;
            log_info!(
                "precondition failed (dpr {:.3}, fullscreen {}), attempt {}",
                verdict.observed_dpr,
                verdict.fullscreen,
                attempts
            );

            let reply = self
                .present_checked(ScreenRequest::PreconditionCheck {
                    observed_dpr: verdict.observed_dpr,
                    fullscreen: verdict.fullscreen,
                    attempts,
                    bypass_offered,
                })
                .await;

            match reply {
                Some(ScreenReply::PreconditionAction {
                    action: PreconditionAction::Bypass,
                }) if bypass_offered => {
                    self.monitor.note_bypass().await;
                    return true;
                }
                Some(_) => {}
                None => return false,
            }
        }
    }

    async fn consent(&mut self) -> bool {
        self.enter(SessionPhase::Consent);
        match self.present_checked(ScreenRequest::Consent).await {
            Some(ScreenReply::ConsentDecision { accepted }) if accepted => true,
            Some(_) => {
                // Anything short of an explicit accept declines.
                self.termination
                    .terminate(TerminationCause::ConsentDeclined);
                false
            }
            None => false,
        }
    }

    async fn demographics(&mut self) -> bool {
        self.enter(SessionPhase::Demographics);
        match self.present_checked(ScreenRequest::DemographicsForm).await {
            Some(ScreenReply::DemographicsSubmitted { record }) => {
                self.state.demographics = record;
                true
            }
            Some(other) => {
                // The sink renders absent fields as empty, so proceed.
                log_warn!("demographics screen resolved without a record: {:?}", other);
                true
            }
            None => false,
        }
    }

    /// The one-way practice-to-main transition: feedback screen, then
    /// deviations switch from warnings to termination.
    async fn end_practice_mode(&mut self) -> bool {
        if !self
            .show(SessionPhase::PracticeFeedback, StaticPage::PracticeFeedback)
            .await
        {
            return false;
        }
        self.monitor.escalate();
        let _ = self.events.send(SessionEvent::PracticeEnded);
        true
    }

    /// Drive one presentation's script and record its outcome. Resolves to
    /// `false` when a termination cancelled it mid-flight; nothing is
    /// recorded for a cancelled presentation.
    async fn run_presentation(&mut self, spec: PresentationSpec) -> bool {
        let script = build_script(spec, &self.config.timing, &mut self.rng);
        let ledger = ResponseLedger::new();

        for step in &script.steps {
            if self.termination.is_terminated() {
                return false;
            }
            let ok = match step {
                ScreenStep::Intro => self
                    .present_checked(ScreenRequest::Static {
                        page: StaticPage::PresentationIntro,
                    })
                    .await
                    .is_some(),
                ScreenStep::Exposure { duration } => {
                    // The host resolves exposure immediately; the engine
                    // owns the duration clock.
                    self.present_checked(ScreenRequest::Exposure {
                        layout: script.spec.layout.clone(),
                        size: script.spec.size,
                        duration_ms: duration.as_millis() as u64,
                    })
                    .await
                    .is_some()
                        && self.hold(*duration).await
                }
                ScreenStep::Mask { duration } => {
                    self.present_checked(ScreenRequest::Mask {
                        duration_ms: duration.as_millis() as u64,
                    })
                    .await
                    .is_some()
                        && self.hold(*duration).await
                }
                ScreenStep::Prompt { dim, kind } => {
                    self.run_prompt(*dim, kind.clone(), &ledger).await
                }
            };
            if !ok {
                return false;
            }
        }

        // Re-read everything from the ledger; a racing timeout may have
        // resolved prompts in a different order than their screens ran.
        let answers = ledger.snapshot().await;
        let index = script.spec.index;
        let practice = script.spec.practice;
        self.state.record_outcome(record_outcome(&script, &answers));
        let _ = self.events.send(SessionEvent::PresentationRecorded {
            index,
            practice,
            completed_main: self.state.completed_main(),
        });
        true
    }

    /// Present one prompt, racing the reply against the hard deadline.
    /// Either way the slot resolves exactly once in the ledger.
    async fn run_prompt(
        &mut self,
        dim: MeasureDim,
        kind: PromptKind,
        ledger: &ResponseLedger,
    ) -> bool {
        let options_shown = kind.options_shown();
        let started = Instant::now();

        let resolved = tokio::select! {
            outcome = timeout(
                self.config.timing.prompt_timeout,
                self.host.present(ScreenRequest::Prompt { dim, kind }),
            ) => Some(outcome),
            _ = self.termination.token().cancelled() => None,
        };

        let Some(outcome) = resolved else {
            return false;
        };

        match outcome {
            Ok(ScreenReply::PromptAnswer { answer }) => {
                ledger
                    .resolve(RecordedAnswer {
                        dim,
                        options_shown,
                        answer: Some(answer),
                        elapsed_ms: Some(started.elapsed().as_millis() as u64),
                    })
                    .await;
            }
            Ok(other) => {
                log_warn!(
                    "prompt for {} resolved with {:?}, recording a timeout",
                    dim.as_str(),
                    other
                );
                ledger
                    .resolve(RecordedAnswer::timed_out(dim, options_shown))
                    .await;
            }
            Err(_) => {
                log_info!(
                    "prompt for {} hit the {:?} deadline",
                    dim.as_str(),
                    self.config.timing.prompt_timeout
                );
                ledger
                    .resolve(RecordedAnswer::timed_out(dim, options_shown))
                    .await;
            }
        }
        true
    }

    /// Pace a no-input screen, staying responsive to termination.
    async fn hold(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = sleep(duration) => true,
            _ = self.termination.token().cancelled() => false,
        }
    }

    /// Assemble the payload and resolve it against the sink, with the
    /// configured file fallback. Failures resolve to a status, never an
    /// error; the participant's completion screen does not depend on the
    /// researcher's side.
    async fn export(&mut self) -> ExportStatus {
        let audit = self.monitor.audit_snapshot().await;
        let payload = build_payload(&self.state, &audit, &self.config.design);
        let status = resolve_export(
            self.sink.as_ref(),
            &payload,
            self.config.fallback_export_path.as_deref(),
        )
        .await;
        let _ = self.events.send(SessionEvent::ExportResolved { status });
        status
    }
}
