//! Engine for browser-run face-perception studies: session phase
//! sequencing, display-fidelity enforcement, stimulus scheduling, and
//! dataset assembly/export. Hosts embed the engine by implementing the
//! traits in [`host`] and driving [`SessionEngine::run`].

pub mod config;
pub mod export;
pub mod fidelity;
pub mod host;
pub mod models;
pub mod sequencer;
pub mod session;
pub mod utils;

pub use config::{EngineConfig, ExperimentDesign, RoundsDesign, TimingConfig, TrialsDesign};
pub use export::{ExportPayload, FileExportSink};
pub use fidelity::{FidelityMonitor, FidelityPolicy};
pub use host::{DisplayProbe, ExportSink, ScreenHost};
pub use session::{SessionEngine, SessionEvent};
