pub mod monitor;
pub mod scale;
mod watcher;

pub use monitor::{FidelityMonitor, FidelityPolicy, PreconditionVerdict};
pub use scale::infer_scale_bucket;
