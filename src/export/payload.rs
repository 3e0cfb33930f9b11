//! The export payload: one JSON document per session, routed to a record
//! set by the experiment tag. Field names follow the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ExperimentDesign;
use crate::models::{Demographics, FidelityEvent, PresentationOutcome, ZoomAudit};
use crate::session::SessionState;

/// Fidelity audit as exported: the audit record plus the derived count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomTracking {
    pub zoom_check_bypassed: bool,
    pub zoom_check_attempts: u32,
    pub approved_dpr: Option<f64>,
    pub zoom_changes_count: usize,
    pub zoom_changes: Vec<FidelityEvent>,
    pub terminated_due_to_zoom: bool,
}

impl From<ZoomAudit> for ZoomTracking {
    fn from(audit: ZoomAudit) -> Self {
        Self {
            zoom_check_bypassed: audit.zoom_check_bypassed,
            zoom_check_attempts: audit.zoom_check_attempts,
            approved_dpr: audit.approved_dpr,
            zoom_changes_count: audit.zoom_changes.len(),
            zoom_changes: audit.zoom_changes,
            terminated_due_to_zoom: audit.terminated_due_to_zoom,
        }
    }
}

/// The one JSON body handed to the sink. Exactly one of `trials`/`rounds`
/// is present, keyed by the experiment variant; the sink tolerates absent
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    /// Routing tag; the sink picks a record set by it.
    pub experiment: String,
    /// Opaque session id; no participant identity is collected.
    pub participant_id: String,
    pub timestamp: DateTime<Utc>,
    pub demographics: Demographics,
    pub zoom_tracking: ZoomTracking,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trials: Option<Vec<PresentationOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<Vec<PresentationOutcome>>,
}

/// Assemble the payload from the session store and the audit snapshot.
/// Every recorded outcome ships, practice ones flagged by their spec.
pub fn build_payload(
    state: &SessionState,
    audit: &ZoomAudit,
    design: &ExperimentDesign,
) -> ExportPayload {
    let outcomes = state.outcomes().to_vec();
    let (trials, rounds) = match design {
        ExperimentDesign::Trials(_) => (Some(outcomes), None),
        ExperimentDesign::Rounds(_) => (None, Some(outcomes)),
    };

    ExportPayload {
        experiment: design.tag().to_string(),
        participant_id: state.id.clone(),
        timestamp: Utc::now(),
        demographics: state.demographics.clone(),
        zoom_tracking: ZoomTracking::from(audit.clone()),
        trials,
        rounds,
    }
}
