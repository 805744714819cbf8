//! Logging conventions shared by every module.
//!
//! All messages go through `tracing` with the fixed target [`LOG_TARGET`], which
//! plays the role of a module prefix in the formatted output. A second,
//! verbosity-gated tier (`extra_info!` / `extra_warn!`) is controlled by
//! `Config::enable_extra_logging` and is meant for step-by-step diagnostics of
//! lookups, reloads and item naming.

/// Target attached to every log line emitted by this crate.
pub const LOG_TARGET: &str = "site_dictionary";

/// Info-level message that is only emitted when extra logging is enabled.
macro_rules! extra_info {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!(target: $crate::logging::LOG_TARGET, $($arg)+);
        }
    };
}

/// Warn-level message that is only emitted when extra logging is enabled.
macro_rules! extra_warn {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::warn!(target: $crate::logging::LOG_TARGET, $($arg)+);
        }
    };
}

pub(crate) use extra_info;
pub(crate) use extra_warn;
