#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! Provides the `engine_*` logging macros used across the codebase, a
//! per-thread dispatch context that tags messages with the request id of the
//! job being worked on, and initializers for the global logger.

use std::cell::Cell;
use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

thread_local! {
    /// Request id of the dispatch whose effects this thread is executing.
    static DISPATCH_CONTEXT: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Sets (or clears) the dispatch context for the current thread.
pub fn set_dispatch_context(request_id: Option<u64>) {
    DISPATCH_CONTEXT.with(|v| v.set(request_id));
}

/// Returns the dispatch context of the current thread, if any.
pub fn dispatch_context() -> Option<u64> {
    DISPATCH_CONTEXT.with(|v| v.get())
}

/// Runs `f` with the dispatch context set, restoring the previous one after.
pub fn with_dispatch_context<R>(request_id: u64, f: impl FnOnce() -> R) -> R {
    let previous = dispatch_context();
    set_dispatch_context(Some(request_id));
    let result = f();
    set_dispatch_context(previous);
    result
}

/// Prefix inserted before every message emitted through the macros.
#[doc(hidden)]
pub fn context_prefix() -> String {
    match dispatch_context() {
        Some(id) => format!("[req {id}] "),
        None => String::new(),
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($level:ident, $($arg:tt)*) => {{
        log::$level!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {
        $crate::__engine_log!(trace, $($arg)*)
    };
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {
        $crate::__engine_log!(info, $($arg)*)
    };
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {
        $crate::__engine_log!(debug, $($arg)*)
    };
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {
        $crate::__engine_log!(warn, $($arg)*)
    };
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {
        $crate::__engine_log!(error, $($arg)*)
    };
}

/// Destination for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to the terminal.
    Terminal,
    /// Write to the given file, truncating it.
    File(PathBuf),
    /// Write to both the terminal and the given file.
    Both(PathBuf),
}

/// Initializes the global logger.
///
/// A file that cannot be created is reported on stderr and skipped; the
/// terminal logger still comes up for `Both`.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::Terminal => vec![term_logger(level, config)],
        LogDestination::File(path) => match create_file_logger(&path, level, config) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Both(path) => {
            let mut loggers = vec![term_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(&path, level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // CDP and HTTP internals are noisy at info.
        .add_filter_ignore_str("chromiumoxide")
        .add_filter_ignore_str("tungstenite")
        .add_filter_ignore_str("hyper")
        .build()
}

fn term_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(
    path: &PathBuf,
    level: LevelFilter,
    config: Config,
) -> Option<Box<dyn SharedLogger>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{context_prefix, dispatch_context, with_dispatch_context};

    #[test]
    fn dispatch_context_is_scoped() {
        assert_eq!(context_prefix(), "");
        let inner = with_dispatch_context(7, || {
            assert_eq!(dispatch_context(), Some(7));
            with_dispatch_context(8, context_prefix)
        });
        assert_eq!(inner, "[req 8] ");
        assert_eq!(dispatch_context(), None);
    }
}
