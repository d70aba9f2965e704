// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use crate::config::model::{
    ConfigFile, DeploySettings, RawConfigFile, RawDeploySection, RawScanSection, ScanSettings,
};
use crate::deploy::configure::normalize_context_path;
use crate::errors::{HotdeployError, Result};
use crate::types::{DeployStrategy, ReloadMode};
use crate::watch::PathFilter;

/// Upper bound for `scan.settle_cycles`.
pub const MAX_SETTLE_CYCLES: u32 = 16;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = HotdeployError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let scan = validate_scan(&raw.scan)?;
        let deploy = validate_deploy(&raw.deploy)?;
        let classes_filter = validate_classes(&raw)?;
        validate_externals(&raw)?;

        Ok(ConfigFile {
            scan,
            deploy,
            classes_filter,
            external: raw.external,
        })
    }
}

fn config_error(msg: impl Into<String>) -> HotdeployError {
    HotdeployError::ConfigError(msg.into())
}

fn validate_scan(scan: &RawScanSection) -> Result<ScanSettings> {
    let reload: ReloadMode = scan
        .reload
        .parse()
        .map_err(|e: String| config_error(format!("[scan].reload: {e}")))?;

    if scan.settle_cycles > MAX_SETTLE_CYCLES {
        return Err(config_error(format!(
            "[scan].settle_cycles must be <= {MAX_SETTLE_CYCLES} (got {})",
            scan.settle_cycles
        )));
    }
    if scan.max_depth == 0 {
        return Err(config_error("[scan].max_depth must be >= 1 (got 0)"));
    }

    for pattern in &scan.patterns {
        PathFilter::from_pattern(pattern)
            .map_err(|e| config_error(format!("[[scan.patterns]]: {e:#}")))?;
    }

    let seconds = scan.interval_seconds.unwrap_or(1);
    let interval = if seconds <= 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(seconds as u64)
    };

    if reload == ReloadMode::Manual && scan.interval_seconds.is_some_and(|s| s > 0) {
        warn!(
            interval_seconds = seconds,
            "reload is manual; the configured scan interval is ignored"
        );
    }

    Ok(ScanSettings {
        interval,
        reload,
        settle_cycles: scan.settle_cycles,
        report_existing: scan.report_existing,
        max_depth: scan.max_depth,
        use_hash: scan.use_hash,
        targets: scan.targets.clone(),
        patterns: scan.patterns.clone(),
    })
}

fn validate_deploy(deploy: &RawDeploySection) -> Result<DeploySettings> {
    let strategy = match deploy.mode.trim().to_lowercase().as_str() {
        "single" => {
            if !deploy.excluded_apps.is_empty() {
                warn!("excluded apps only apply to aggregated mode; ignoring");
            }
            DeployStrategy::Single {
                project: deploy.project.clone(),
            }
        }
        "aggregated" => DeployStrategy::Aggregated {
            excluded: deploy.excluded_apps.clone(),
        },
        other => {
            return Err(config_error(format!(
                "invalid [deploy].mode: {other} (expected \"single\" or \"aggregated\")"
            )));
        }
    };

    if deploy.launch.trim().is_empty() {
        return Err(config_error("[deploy].launch must be set"));
    }

    let ready_on_stdout = deploy
        .ready_on_stdout
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| config_error(format!("[deploy].ready_on_stdout: {e}")))
        })
        .transpose()?;

    let step_timeout =
        (deploy.step_timeout_seconds > 0).then(|| Duration::from_secs(deploy.step_timeout_seconds));

    Ok(DeploySettings {
        strategy,
        step_timeout,
        manifest: deploy.manifest.clone(),
        launch: deploy.launch.clone(),
        ready_on_stdout,
        repositories: deploy.repositories.clone(),
        work_dir: deploy.work_dir.clone(),
    })
}

fn validate_classes(raw: &RawConfigFile) -> Result<Option<PathFilter>> {
    let filter = PathFilter::new(&raw.classes.includes, &raw.classes.excludes)
        .map_err(|e| config_error(format!("[classes]: {e:#}")))?;
    Ok((!filter.is_empty()).then_some(filter))
}

fn validate_externals(raw: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for external in &raw.external {
        let path = normalize_context_path(&external.context_path);
        if !seen.insert(path.clone()) {
            return Err(config_error(format!(
                "external context path {path} is declared more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = parse("[deploy]\nlaunch = \"serve\"\n").unwrap();
        assert_eq!(cfg.scan.interval, Duration::from_secs(1));
        assert_eq!(cfg.scan.reload, ReloadMode::Automatic);
        assert_eq!(cfg.scan.settle_cycles, 1);
        assert_eq!(cfg.deploy.step_timeout, Some(Duration::from_secs(60)));
        assert_eq!(cfg.deploy.strategy, DeployStrategy::Single { project: None });
        assert!(cfg.classes_filter.is_none());
    }

    #[test]
    fn non_positive_interval_disables_scanning() {
        let cfg = parse("[scan]\ninterval_seconds = -5\n[deploy]\nlaunch = \"serve\"\n").unwrap();
        assert!(cfg.scan.interval.is_zero());
        assert!(!cfg.scan.scanner_config().is_enabled());
    }

    #[test]
    fn invalid_reload_mode_is_rejected() {
        let err = parse("[scan]\nreload = \"sometimes\"\n[deploy]\nlaunch = \"serve\"\n").unwrap_err();
        assert!(matches!(err, HotdeployError::ConfigError(msg) if msg.contains("sometimes")));
    }

    #[test]
    fn invalid_deploy_mode_is_rejected() {
        let err = parse("[deploy]\nmode = \"clustered\"\nlaunch = \"serve\"\n").unwrap_err();
        assert!(matches!(err, HotdeployError::ConfigError(_)));
    }

    #[test]
    fn missing_launch_is_rejected() {
        assert!(matches!(parse(""), Err(HotdeployError::ConfigError(_))));
    }

    #[test]
    fn bounds_are_checked() {
        let too_many = parse("[scan]\nsettle_cycles = 17\n[deploy]\nlaunch = \"serve\"\n");
        assert!(matches!(too_many, Err(HotdeployError::ConfigError(_))));
        let no_depth = parse("[scan]\nmax_depth = 0\n[deploy]\nlaunch = \"serve\"\n");
        assert!(matches!(no_depth, Err(HotdeployError::ConfigError(_))));
    }

    #[test]
    fn bad_globs_and_regexes_are_rejected() {
        let bad_glob = parse("[classes]\nincludes = [\"a/[b\"]\n[deploy]\nlaunch = \"serve\"\n");
        assert!(matches!(bad_glob, Err(HotdeployError::ConfigError(_))));
        let bad_regex = parse("[deploy]\nlaunch = \"serve\"\nready_on_stdout = \"(\"\n");
        assert!(matches!(bad_regex, Err(HotdeployError::ConfigError(_))));
    }

    #[test]
    fn duplicate_external_context_paths_are_rejected() {
        let src = r#"
[deploy]
launch = "serve"

[[external]]
context_path = "/docs"
group_id = "g"
artifact_id = "docs"
version = "1"
type = "war"

[[external]]
context_path = "docs"
group_id = "g"
artifact_id = "docs2"
version = "1"
"#;
        assert!(matches!(parse(src), Err(HotdeployError::ConfigError(_))));
    }
}
