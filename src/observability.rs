//! Scanner log events.
//!
//! Every event is emitted under the `hbase_scan` target with a `component`
//! (`bridge`, `scanner`, `range`) and an `event` name. Nothing here installs a
//! subscriber.
//!
//! Levels:
//!
//! - info: once per process or per scan (`bridge_resolved`, `scan_started`)
//! - debug: per range (`range_opened`, `scan_exhausted`)
//! - warn: a release step failed during close (`close_failed`)
//! - error: the scan cannot go on (`too_many_cells`, `scan_failed`)
//!
//! Row keys and cell values are never logged; ranges are logged at debug only.

/// Target for all scanner log events.
pub(crate) const SCAN_TARGET: &str = "hbase_scan";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "scanner",
///     event = "scan_started",
///     table = %name,
///     caching = rows,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::SCAN_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::SCAN_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::SCAN_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::SCAN_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
