//! Session-level data models: phases, termination causes, demographics, and
//! the summary handed back to the embedding host.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form demographics record collected once per session.
pub type Demographics = BTreeMap<String, String>;

/// Where the session currently is in its timeline.
///
/// Linear except for the precondition self-loop; `Terminated` and `Closed`
/// are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Preload,
    PreconditionIntro,
    EnterFullscreen,
    PreconditionLoop,
    MonitorInit,
    Welcome,
    Consent,
    Demographics,
    Instructions,
    PracticeIntro,
    Practice,
    PracticeFeedback,
    MainBlock,
    Debrief,
    Export,
    Closed,
    Terminated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Preload => "preload",
            SessionPhase::PreconditionIntro => "precondition_intro",
            SessionPhase::EnterFullscreen => "enter_fullscreen",
            SessionPhase::PreconditionLoop => "precondition_loop",
            SessionPhase::MonitorInit => "monitor_init",
            SessionPhase::Welcome => "welcome",
            SessionPhase::Consent => "consent",
            SessionPhase::Demographics => "demographics",
            SessionPhase::Instructions => "instructions",
            SessionPhase::PracticeIntro => "practice_intro",
            SessionPhase::Practice => "practice",
            SessionPhase::PracticeFeedback => "practice_feedback",
            SessionPhase::MainBlock => "main_block",
            SessionPhase::Debrief => "debrief",
            SessionPhase::Export => "export",
            SessionPhase::Closed => "closed",
            SessionPhase::Terminated => "terminated",
        }
    }

    /// Terminal phases accept no further screens.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Closed | SessionPhase::Terminated)
    }
}

/// Why a session ended early. Both causes are deliberate, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCause {
    /// Display scale drifted from the approved baseline during the main
    /// block; the stimulus size is no longer controlled.
    FidelityViolation,
    /// The participant declined the consent form.
    ConsentDeclined,
}

impl TerminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationCause::FidelityViolation => "fidelity_violation",
            TerminationCause::ConsentDeclined => "consent_declined",
        }
    }
}

/// How the export step resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    /// The sink accepted the payload (fire-and-forget: accepted means the
    /// submission call did not error).
    Submitted,
    /// The sink failed but the fallback file was written.
    FallbackSaved,
    /// The sink failed and no fallback was available, or it also failed.
    Failed,
    /// Nothing to export (consent declined).
    Skipped,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Submitted => "submitted",
            ExportStatus::FallbackSaved => "fallback_saved",
            ExportStatus::Failed => "failed",
            ExportStatus::Skipped => "skipped",
        }
    }
}

/// What `SessionEngine::run` resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub final_phase: SessionPhase,
    pub completed_practice: usize,
    pub completed_main: usize,
    pub terminated_for: Option<TerminationCause>,
    pub export: ExportStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(SessionPhase::Closed.is_terminal());
        assert!(SessionPhase::Terminated.is_terminal());
        assert!(!SessionPhase::MainBlock.is_terminal());
        assert!(!SessionPhase::Preload.is_terminal());
    }

    #[test]
    fn cause_labels() {
        assert_eq!(
            TerminationCause::FidelityViolation.as_str(),
            "fidelity_violation"
        );
        assert_eq!(ExportStatus::FallbackSaved.as_str(), "fallback_saved");
    }
}
