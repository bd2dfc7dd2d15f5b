//! Diagnostic logging setup plus module-gated logging macros.
//!
//! Each module that uses the macros declares its own switch:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("scheduler started");
//! ```
//!
//! The macros are exported at the crate root. They are separate from the
//! user-facing activity log kept in `SessionStats`.

use log::LevelFilter;

/// Installs the global `env_logger` backend. `RUST_LOG` still wins over the
/// default filter so individual modules can be turned up from the shell.
pub fn init(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    // A second init (tests, embedding hosts) is harmless.
    let _ = builder.format_timestamp_millis().try_init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Per-cycle chatter. Kept behind the same switch so hot loops can be muted
/// without touching the global filter.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
