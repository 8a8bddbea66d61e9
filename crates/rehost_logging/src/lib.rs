#![deny(missing_docs)]
//! Shared logging utilities for the rehost workspace.
//!
//! This crate provides the `rehost_*` logging macros used across the codebase,
//! a thread-local run context for log correlation, and a minimal test
//! initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the message id of the run in progress.
    static RUN_MESSAGE: Cell<u64> = const { Cell::new(0) };
}

/// Sets the current run's message id for the current thread.
/// The run coordinator calls this when a run starts and clears it on exit.
pub fn set_run_message(message_id: u64) {
    RUN_MESSAGE.with(|v| v.set(message_id));
}

/// Retrieves the message id of the run in progress on the current thread.
/// Returns 0 when no run is active.
pub fn get_run_message() -> u64 {
    RUN_MESSAGE.with(|v| v.get())
}

/// Log-line prefix carrying the current run's message id, empty outside of
/// a run. The `rehost_*` macros prepend it to every line they emit.
pub fn run_prefix() -> String {
    match get_run_message() {
        0 => String::new(),
        id => format!("[message {id}] "),
    }
}

/// Logs a trace-level message with the current run context prepended.
#[macro_export]
macro_rules! rehost_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message with the current run context prepended.
#[macro_export]
macro_rules! rehost_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message with the current run context prepended.
#[macro_export]
macro_rules! rehost_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message with the current run context prepended.
#[macro_export]
macro_rules! rehost_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message with the current run context prepended.
#[macro_export]
macro_rules! rehost_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_prefix_follows_the_thread_local_context() {
        assert_eq!(run_prefix(), "");
        set_run_message(7);
        assert_eq!(run_prefix(), "[message 7] ");
        assert_eq!(get_run_message(), 7);
        set_run_message(0);
        assert_eq!(run_prefix(), "");
    }
}
