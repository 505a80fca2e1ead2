//! Logging setup.
//!
//! The driver logs through `tracing`. Applications that already install a
//! subscriber need nothing from this module; others can call [`init`] once
//! at startup (requires the `tracing-subscriber` feature).
//!
//! # Environment Variables
//!
//! - `ASTRA_DEBUG=true|1|yes` - enable debug logging
//! - `ASTRA_LOG_LEVEL=trace|debug|info|warn|error` - set the level explicitly
//! - `ASTRA_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! astra_driver::logging::init();
//! ```

use std::env;
use std::fmt;
use std::sync::Once;

/// Enables debug logging.
pub const DEBUG_ENV: &str = "ASTRA_DEBUG";
/// Overrides the log level.
pub const LOG_LEVEL_ENV: &str = "ASTRA_LOG_LEVEL";
/// Selects the output format.
pub const LOG_FORMAT_ENV: &str = "ASTRA_LOG_FORMAT";

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human oriented.
    Pretty,
    /// Single line, human oriented.
    Compact,
}

impl LogFormat {
    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("pretty") => Self::Pretty,
            Some("compact") => Self::Compact,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

fn debug_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn level_for(level: Option<&str>, debug: bool) -> &'static str {
    let fallback = if debug { "debug" } else { "warn" };
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

/// Whether `ASTRA_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    debug_flag(env::var(DEBUG_ENV).ok().as_deref())
}

/// Level from `ASTRA_LOG_LEVEL`, else `debug` when debugging, else `warn`.
pub fn log_level() -> &'static str {
    level_for(env::var(LOG_LEVEL_ENV).ok().as_deref(), is_debug_enabled())
}

/// Format from `ASTRA_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    LogFormat::from_value(env::var(LOG_FORMAT_ENV).ok().as_deref())
}

/// Install a global subscriber for the driver's targets.
///
/// Does nothing unless `ASTRA_DEBUG` or `ASTRA_LOG_LEVEL` is set, or when the
/// `tracing-subscriber` feature is off. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(LOG_LEVEL_ENV).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let format = log_format();
            let filter = EnvFilter::try_new(format!("astra_driver={level},astra_connect={level}"))
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);

            // try_init: the host may have installed its own subscriber.
            let installed = match format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };
            if installed.is_ok() {
                tracing::info!(level = level, format = %format, "Astra logging initialized");
            }
        }
    });
}
