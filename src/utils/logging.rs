//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag,
//! plus the env_logger bootstrap used by embedding hosts and tests.
//!
//! Modules with chatty background loops define the flag once:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("only emitted while ENABLE_LOGS is true");
//! ```

/// Conditional info logging.
/// The calling module must define a `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional warn logging.
/// The calling module must define a `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging.
/// The calling module must define a `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Initialize env_logger for the embedding process.
///
/// Reads `RUST_LOG`, defaulting to info. Safe to call more than once; later
/// calls are no-ops.
pub fn init_from_env() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
