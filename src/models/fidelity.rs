//! Display-fidelity audit models.
//!
//! The audit record is exported verbatim, so serde names follow the wire
//! format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One detected deviation of the observed device pixel ratio from the
/// approved baseline. Append-only; never mutated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityEvent {
    pub timestamp: DateTime<Utc>,
    pub approved_dpr: f64,
    pub current_dpr: f64,
    /// Observed scale relative to the baseline, as a rounded percentage.
    pub detected_zoom: f64,
}

impl FidelityEvent {
    pub fn new(approved_dpr: f64, current_dpr: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            approved_dpr,
            current_dpr,
            detected_zoom: zoom_percent(current_dpr, approved_dpr),
        }
    }
}

/// Observed scale relative to the approved baseline, as a rounded
/// percentage (100.0 = unchanged).
pub fn zoom_percent(current_dpr: f64, approved_dpr: f64) -> f64 {
    if approved_dpr == 0.0 {
        return 0.0;
    }
    (current_dpr / approved_dpr * 100.0).round()
}

/// The session's fidelity audit record: precondition bookkeeping, the
/// approved baseline, and every deviation seen since.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoomAudit {
    pub zoom_check_bypassed: bool,
    pub zoom_check_attempts: u32,
    /// The approved reference ratio. Set exactly once, at the moment the
    /// precondition first passes; later zoom actions change the observed
    /// ratio, never this value.
    pub approved_dpr: Option<f64>,
    pub zoom_changes: Vec<FidelityEvent>,
    pub terminated_due_to_zoom: bool,
}

impl ZoomAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the baseline if not already captured. Idempotent: a second
    /// call never overwrites the first value.
    pub fn approve(&mut self, dpr: f64) {
        if self.approved_dpr.is_none() {
            self.approved_dpr = Some(dpr);
        }
    }

    pub fn baseline(&self) -> Option<f64> {
        self.approved_dpr
    }

    /// Append a deviation against the stored baseline and return it.
    /// Returns `None` when no baseline has been approved yet.
    pub fn record_deviation(&mut self, current_dpr: f64) -> Option<FidelityEvent> {
        let approved = self.approved_dpr?;
        let event = FidelityEvent::new(approved, current_dpr);
        self.zoom_changes.push(event.clone());
        Some(event)
    }

    pub fn zoom_changes_count(&self) -> usize {
        self.zoom_changes.len()
    }
}
