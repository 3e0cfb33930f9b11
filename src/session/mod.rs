pub mod engine;
pub mod events;
pub mod state;

pub use engine::SessionEngine;
pub use events::SessionEvent;
pub use state::{SessionState, TerminationHandle};
