//! Structured logging for the medalpond workspace
//!
//! Every crate logs through the macros exported here so that a single
//! environment variable controls verbosity for the whole process:
//!
//! - `MEDALPOND_LOG=off` (default) - no logs
//! - `MEDALPOND_LOG=error` / `warn` - problems only
//! - `MEDALPOND_LOG=info` - run progress and row counts
//! - `MEDALPOND_LOG=debug` - per-file and per-column detail

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "MEDALPOND_LOG";

static INIT: Once = Once::new();

/// Minimum level for emitted events, parsed from `MEDALPOND_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Parse a level name. Unknown names map to `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Some(Self::Off),
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    fn min_level(self) -> Option<emit::Level> {
        match self {
            Self::Off => None,
            Self::Error => Some(emit::Level::Error),
            Self::Warn => Some(emit::Level::Warn),
            Self::Info => Some(emit::Level::Info),
            Self::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from the `MEDALPOND_LOG` environment variable.
///
/// Safe to call multiple times; only the first call has an effect.
pub fn init_diagnostics() {
    init_with_default(LogLevel::Off);
}

/// Initialize diagnostics, using `default` when `MEDALPOND_LOG` is unset.
///
/// The command line uses this to turn on `info` output for `--verbose`
/// without overriding an explicit environment setting.
pub fn init_with_default(default: LogLevel) {
    INIT.call_once(|| {
        let (level, unknown) = match std::env::var(LOG_ENV) {
            Ok(value) => match LogLevel::parse(&value) {
                Some(level) => (level, None),
                None => (LogLevel::Info, Some(value)),
            },
            Err(_) => (default, None),
        };

        let Some(min) = level.min_level() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        if let Some(value) = unknown {
            emit::warn!(
                "unknown {env} value {value}, using info",
                env: LOG_ENV,
                value: value.as_str()
            );
        }

        // The runtime must outlive every emitting thread.
        std::mem::forget(rt);
    });
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

/// Log basic operations: run progress, files read, tables written.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics: per-file row counts, column coercions, schema unions.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions: missing inputs, encoding fallbacks.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort a run.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init_with_default(LogLevel::Debug);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(LogLevel::parse("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse(" INFO "), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("chatty"), None);
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
