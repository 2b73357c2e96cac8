//! Logger setup plus per-module switches for chatty hot-path logging.
//!
//! Modules that log on every byte or frame define the flag first, then use
//! the macros exported at the crate root:
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::log_trace;
//! log_trace!("resynchronising after {} bytes", skipped);
//! ```

use anyhow::{Context, Result};
use log::LevelFilter;

/// Installs `env_logger` with `default_level` as the baseline filter;
/// `RUST_LOG` directives take precedence.
pub fn init(default_level: &str) -> Result<()> {
    let level: LevelFilter = default_level
        .parse()
        .with_context(|| format!("invalid log level '{default_level}'"))?;

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .context("logger already initialised")
}

/// Logger for unit and integration tests. Safe to call repeatedly.
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// Debug logging gated on the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Trace logging gated on the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_levels() {
        assert!(init("chatty").is_err());
    }

    #[test]
    fn test_logger_tolerates_repeat_init() {
        init_for_tests();
        init_for_tests();
        log::info!("logger ready");
    }
}
