//! Progress events for embedding hosts that want to observe the session
//! without polling. Fire-and-forget: a missing or lagging receiver never
//! blocks the engine.

use serde::{Deserialize, Serialize};

use crate::models::{ExportStatus, SessionPhase, TerminationCause};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    PhaseChanged {
        phase: SessionPhase,
    },
    /// One presentation's outcome was recorded.
    PresentationRecorded {
        index: usize,
        practice: bool,
        completed_main: usize,
    },
    /// A practice-phase deviation was warned about.
    ZoomWarning {
        detected_zoom: f64,
    },
    /// The warn-to-terminate fidelity switch fired. Sent exactly once.
    PracticeEnded,
    Terminated {
        cause: TerminationCause,
    },
    ExportResolved {
        status: ExportStatus,
    },
}
