pub mod payload;
pub mod sink;

pub use payload::{build_payload, ExportPayload, ZoomTracking};
pub use sink::{resolve_export, FileExportSink};
