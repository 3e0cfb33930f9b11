//! Contracts for the external collaborators the engine depends on: the
//! rendering host (widgets, overlays), the display probe (device pixel
//! ratio, fullscreen), and the export sink.
//!
//! The engine owns all timing and sequencing; hosts render what they are
//! told and resolve screens with the participant's action. Exposure and
//! mask screens resolve as soon as they are rendered — the engine runs
//! their duration timers itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::export::ExportPayload;
use crate::models::{
    Demographics, DisplaySize, PromptAnswer, PromptKind, MeasureDim, StimulusLayout,
    TerminationCause,
};

/// Static instructional pages. Copy lives host-side; the engine only
/// sequences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaticPage {
    Preload,
    PreconditionIntro,
    EnterFullscreen,
    Welcome,
    Instructions,
    PracticeIntro,
    PracticeFeedback,
    PresentationIntro,
    Debrief,
}

/// One screen the engine asks the host to put up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenRequest {
    /// Static page; resolves when the participant continues.
    Static { page: StaticPage },
    /// Consent form; resolves with an accept/decline decision.
    Consent,
    /// Demographics form; resolves with the collected record.
    DemographicsForm,
    /// Scale/fullscreen check screen with a re-check button, plus a bypass
    /// affordance once offered.
    PreconditionCheck {
        observed_dpr: f64,
        fullscreen: bool,
        attempts: u32,
        bypass_offered: bool,
    },
    /// Stimulus exposure. No input; resolve immediately once rendered.
    Exposure {
        layout: StimulusLayout,
        size: DisplaySize,
        duration_ms: u64,
    },
    /// Neutral mask/fixation. No input; resolve immediately once rendered.
    Mask { duration_ms: u64 },
    /// Interactive prompt. The engine races the reply against its own
    /// timeout.
    Prompt { dim: MeasureDim, kind: PromptKind },
}

/// What came back from a screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenReply {
    Continue,
    ConsentDecision { accepted: bool },
    DemographicsSubmitted { record: Demographics },
    PreconditionAction { action: PreconditionAction },
    PromptAnswer { answer: PromptAnswer },
}

/// Participant's action on the precondition screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreconditionAction {
    Recheck,
    Bypass,
}

/// Non-blocking overlays and status changes the engine raises at the host.
/// The host owns their lifecycle (dismissal, stacking).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionNotice {
    /// Dismissible practice-phase zoom warning.
    ZoomWarning { detected_zoom: f64 },
    /// Fullscreen was left; ask the participant to re-enter.
    FullscreenPrompt,
    /// Fullscreen is back; the re-entry prompt can come down.
    FullscreenRestored,
    /// Terminal overlay; no further screens will follow.
    Terminated { cause: TerminationCause },
    /// Normal completion (thank-you / close-tab screen).
    Completed,
}

/// Signals the display layer feeds the fidelity monitor. No single browser
/// signal fires for every zoom pathway, so the monitor listens to all of
/// these plus its own poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySignal {
    /// Viewport resize.
    Resized,
    /// The armed ratio-keyed media query fired; the monitor re-arms it.
    RatioWatchFired,
    /// Fullscreen was entered (`true`) or left (`false`).
    FullscreenChanged(bool),
}

/// Read access to the display state plus a signal feed.
pub trait DisplayProbe: Send + Sync {
    fn device_pixel_ratio(&self) -> f64;
    fn is_fullscreen(&self) -> bool;
    fn subscribe(&self) -> broadcast::Receiver<DisplaySignal>;
    /// Arm a media query keyed to `ratio` that fires `RatioWatchFired` once
    /// when the live ratio no longer matches. Re-armed by the monitor after
    /// each firing since the query string depends on the ratio.
    fn arm_ratio_watch(&self, ratio: f64);
}

/// The rendering host: presents screens, raises overlays.
#[async_trait]
pub trait ScreenHost: Send + Sync {
    /// Present a screen and resolve it with the participant's action (or
    /// immediately, for exposure/mask). The engine may drop this future
    /// when its prompt timeout or a termination wins the race; the host
    /// must tolerate that.
    async fn present(&self, screen: ScreenRequest) -> ScreenReply;

    /// Raise a non-blocking overlay or status change.
    fn raise(&self, notice: SessionNotice);
}

/// The remote record sink. Delivery is fire-and-forget at-least-once: a
/// returned `Ok` means the submission call did not error, nothing more.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn submit(&self, payload: &ExportPayload) -> anyhow::Result<()>;
}
