//! Logging setup for docmap.
//!
//! Every docmap crate logs through `tracing`. This module installs a
//! subscriber driven by environment variables, for applications that do not
//! configure one themselves.
//!
//! # Environment Variables
//!
//! - `DOCMAP_DEBUG=true|1|yes` - Enable debug logging
//! - `DOCMAP_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `DOCMAP_LOG_FORMAT=json|pretty|compact` - Set the output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use docmap::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Installing the subscriber needs the `tracing-subscriber` feature; without
//! it `init` only records that initialization happened.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Crates whose events the installed filter admits.
const CRATES: &[&str] = &[
    "docmap",
    "docmap_mapping",
    "docmap_mongodb",
    "docmap_tracing",
];

/// Check if debug logging is enabled via `DOCMAP_DEBUG`.
///
/// Returns `true` if it is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("DOCMAP_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `DOCMAP_LOG_LEVEL`.
///
/// Defaults to "debug" if `DOCMAP_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("DOCMAP_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `DOCMAP_LOG_FORMAT`.
///
/// Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var("DOCMAP_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Filter directives admitting docmap's crates at `level`.
pub fn filter_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize docmap logging.
///
/// Call once at application startup; later calls are no-ops. Nothing is
/// installed unless `DOCMAP_DEBUG` or `DOCMAP_LOG_LEVEL` is set.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("DOCMAP_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(filter_directives(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = level,
                    format = get_log_format(),
                    "docmap logging initialized"
                );
            }
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: This should only be called at program startup before threads are spawned.
    unsafe {
        env::set_var("DOCMAP_LOG_LEVEL", level);
    }
    init();
}

/// Initialize debug logging; equivalent to `DOCMAP_DEBUG=true` plus [`init`].
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_debug() {
    // SAFETY: This should only be called at program startup before threads are spawned.
    unsafe {
        env::set_var("DOCMAP_DEBUG", "true");
    }
    init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        // SAFETY: the only test in this binary touching these variables.
        unsafe {
            env::remove_var("DOCMAP_DEBUG");
            env::remove_var("DOCMAP_LOG_LEVEL");
            env::remove_var("DOCMAP_LOG_FORMAT");
        }
        assert!(!is_debug_enabled());
        assert_eq!(get_log_level(), "warn");
        assert_eq!(get_log_format(), "json");
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives("debug"),
            "docmap=debug,docmap_mapping=debug,docmap_mongodb=debug,docmap_tracing=debug"
        );
    }
}
