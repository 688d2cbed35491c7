//! Scheduler Logging Macros
//!
//! Thin wrappers over `tracing` so that every scheduler event lands on the
//! `MAC` target with a level keyword in front, e.g.
//! `sched_log!(WARN, "SCHED: ... rnti=0x{:x}", rnti)`.
//! With no subscriber installed the macros cost a single level check.

/// Emit a scheduler log record on the `MAC` target.
///
/// The first token selects the level: `ERROR`, `WARN`, `INFO`, `DEBUG` or
/// `TRACE`. The remaining tokens are passed through as a format string and
/// arguments.
#[macro_export]
macro_rules! sched_log {
    (ERROR, $($arg:tt)+) => {
        $crate::__private::tracing::error!(target: "MAC", $($arg)+)
    };
    (WARN, $($arg:tt)+) => {
        $crate::__private::tracing::warn!(target: "MAC", $($arg)+)
    };
    (INFO, $($arg:tt)+) => {
        $crate::__private::tracing::info!(target: "MAC", $($arg)+)
    };
    (DEBUG, $($arg:tt)+) => {
        $crate::__private::tracing::debug!(target: "MAC", $($arg)+)
    };
    (TRACE, $($arg:tt)+) => {
        $crate::__private::tracing::trace!(target: "MAC", $($arg)+)
    };
}
