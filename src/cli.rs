// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::ConfigOverrides;

/// Command-line arguments for `hotdeploy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotdeploy",
    version,
    about = "Serve web applications and redeploy them when their sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Hotdeploy.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Hotdeploy.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTDEPLOY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Seconds between scans; `0` disables scanning. Overrides `[scan].interval_seconds`.
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub scan_interval: Option<i64>,

    /// Reload mode (automatic, manual). Overrides `[scan].reload`.
    #[arg(long, value_name = "MODE")]
    pub reload: Option<String>,

    /// Deploy every war project of the build instead of a single one.
    #[arg(long)]
    pub aggregated: bool,

    /// Leave an application out of an aggregated deployment. Repeatable.
    #[arg(long, value_name = "ARTIFACT")]
    pub exclude: Vec<String>,

    /// Parse + validate, print applications and watch sets, but start nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            scan_interval: self.scan_interval,
            reload: self.reload.clone(),
            aggregated: self.aggregated,
            exclude: self.exclude.clone(),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_overrides() {
        let args = CliArgs::parse_from([
            "hotdeploy",
            "--scan-interval",
            "-1",
            "--aggregated",
            "--exclude",
            "admin",
            "--exclude",
            "docs",
        ]);
        assert_eq!(args.config, "Hotdeploy.toml");
        let overrides = args.overrides();
        assert_eq!(overrides.scan_interval, Some(-1));
        assert!(overrides.aggregated);
        assert_eq!(overrides.exclude, vec!["admin", "docs"]);
        assert!(overrides.reload.is_none());
    }
}
