// src/logging.rs

//! Subscriber setup for `hotdeploy`.
//!
//! Filter selection:
//! 1. `--log-level` raises or lowers this crate only; other crates stay at `warn`.
//! 2. Otherwise `HOTDEPLOY_LOG` is read as a full filter directive string
//!    (`"debug"`, `"hotdeploy::watch=trace,info"`, ...).
//! 3. Otherwise `hotdeploy=info,warn`.
//!
//! Output goes to stderr; stdout belongs to the console and dry-run output.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "HOTDEPLOY_LOG";

const CRATE_TARGET: &str = "hotdeploy";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(crate_directive(level));
    }

    env.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(crate_directive(LogLevel::Info)))
}

fn crate_directive(level: LogLevel) -> String {
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    format!("warn,{CRATE_TARGET}={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_environment() {
        let filter = build_filter(Some(LogLevel::Debug), Some("hotdeploy=trace"));
        assert!(filter.to_string().contains("hotdeploy=debug"));
    }

    #[test]
    fn environment_directives_are_used_verbatim() {
        let filter = build_filter(None, Some("hotdeploy::watch=trace"));
        assert!(filter.to_string().contains("hotdeploy::watch=trace"));
    }

    #[test]
    fn blank_environment_falls_back_to_info() {
        let filter = build_filter(None, Some("  "));
        assert!(filter.to_string().contains("hotdeploy=info"));
    }
}
