//! Logging macros for the scheduler with verbosity level control.
//!
//! Events are emitted through `tracing`, so callers decide where they go by
//! installing a subscriber. The verbosity gate is checked first, keeping
//! logging free when disabled (verbosity=0).
//!
//! Verbosity levels:
//! - 0: SILENT (only errors)
//! - 1: CHANGES (task placements, incumbent improvements) -> `info`
//! - 2: CHECKS (resource consideration, skip reasons) -> `debug`
//! - 3: DEBUG (search internals) -> `trace`

#[doc(hidden)]
pub use tracing;

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: task placements, removals, incumbent improvements.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            $crate::logging::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: resource consideration, skip reasons, eligibility checks.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            $crate::logging::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: branch-and-bound internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            $crate::logging::tracing::trace!($($arg)*);
        }
    };
}

/// Install a default env-filtered fmt subscriber if none is set.
///
/// The scheduler never installs a subscriber on its own; binaries and test
/// harnesses call this once at startup.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
