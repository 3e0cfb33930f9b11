pub mod fidelity;
pub mod presentation;
pub mod session;

pub use fidelity::{zoom_percent, FidelityEvent, ZoomAudit};
pub use presentation::{
    CountField, DisplaySize, Expression, FaceCategory, FaceStimulus, GridCell, MeasureDim,
    MeasureOutcome, PresentationOutcome, PresentationSpec, PromptAnswer, PromptKind,
    ResponseValue, StimulusLayout, TaskCondition,
};
pub use session::{
    Demographics, ExportStatus, SessionPhase, SessionSummary, TerminationCause,
};
