//! Mutable session record and the shared termination flag.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{Demographics, PresentationOutcome, SessionPhase, TerminationCause};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::log_info;

/// The one session-scoped data store: the phase pointer, collected
/// demographics, and every recorded outcome. Owned by the engine; only
/// phase transitions and the record step mutate it.
pub struct SessionState {
    pub id: String,
    pub started_at: DateTime<Utc>,
    phase: SessionPhase,
    pub demographics: Demographics,
    outcomes: Vec<PresentationOutcome>,
    completed_practice: usize,
    completed_main: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            phase: SessionPhase::Preload,
            demographics: Demographics::new(),
            outcomes: Vec::new(),
            completed_practice: 0,
            completed_main: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move the phase pointer. Transitions out of a terminal phase are
    /// ignored.
    pub fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase.is_terminal() {
            return;
        }
        log_info!(
            "session {} phase {} -> {}",
            self.id,
            self.phase.as_str(),
            phase.as_str()
        );
        self.phase = phase;
    }

    /// Append one outcome. Outcomes are immutable once appended; only
    /// non-practice presentations advance the main completed-count.
    pub fn record_outcome(&mut self, outcome: PresentationOutcome) {
        if outcome.spec.practice {
            self.completed_practice += 1;
        } else {
            self.completed_main += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[PresentationOutcome] {
        &self.outcomes
    }

    pub fn completed_practice(&self) -> usize {
        self.completed_practice
    }

    pub fn completed_main(&self) -> usize {
        self.completed_main
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// First-cause-wins termination flag plus the cancel signal that makes
/// already-queued work inert. Cloned into every task that can end the
/// session or must notice it ending.
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    cause: Arc<OnceLock<TerminationCause>>,
    cancel: CancellationToken,
}

impl TerminationHandle {
    pub fn new() -> Self {
        Self {
            cause: Arc::new(OnceLock::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Record the cause and fire the cancel signal. The first caller's
    /// cause sticks; later calls only re-fire the (idempotent) cancel.
    pub fn terminate(&self, cause: TerminationCause) {
        let _ = self.cause.set(cause);
        self.cancel.cancel();
    }

    pub fn cause(&self) -> Option<TerminationCause> {
        self.cause.get().copied()
    }

    pub fn is_terminated(&self) -> bool {
        self.cause.get().is_some()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for TerminationHandle {
    fn default() -> Self {
        Self::new()
    }
}
