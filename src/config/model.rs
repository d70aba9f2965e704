// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::deploy::ExternalSpec;
use crate::types::{DeployStrategy, ReloadMode};
use crate::watch::{PathFilter, ScanPattern, ScannerConfig, DEFAULT_MAX_DEPTH};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scan]
/// interval_seconds = 1
/// reload = "automatic"
/// targets = ["src/main/resources/app.properties"]
///
/// [[scan.patterns]]
/// directory = "src/main/resources"
/// includes = ["**/*.properties"]
///
/// [deploy]
/// mode = "aggregated"
/// manifest = "Build.toml"
/// launch = "java -jar server.jar"
/// ready_on_stdout = "Started"
///
/// [classes]
/// excludes = ["**/*Test.class"]
///
/// [[external]]
/// context_path = "/docs"
/// group_id = "org.acme"
/// artifact_id = "docs"
/// version = "2.0"
/// type = "war"
/// ```
///
/// All sections are optional except `deploy.launch`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scan: RawScanSection,

    #[serde(default)]
    pub deploy: RawDeploySection,

    /// Filter applied to every class output directory.
    #[serde(default)]
    pub classes: ClassesSection,

    #[serde(default)]
    pub external: Vec<ExternalSpec>,
}

/// `[scan]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScanSection {
    /// Seconds between scans; zero or negative disables scanning. Unset
    /// means one second.
    #[serde(default)]
    pub interval_seconds: Option<i64>,

    /// `"automatic"` (default) or `"manual"`.
    #[serde(default = "default_reload")]
    pub reload: String,

    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: u32,

    #[serde(default)]
    pub report_existing: bool,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub use_hash: bool,

    /// Extra files or directories watched for every application.
    #[serde(default)]
    pub targets: Vec<PathBuf>,

    #[serde(default)]
    pub patterns: Vec<ScanPattern>,
}

fn default_reload() -> String {
    "automatic".to_string()
}

fn default_settle_cycles() -> u32 {
    1
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for RawScanSection {
    fn default() -> Self {
        Self {
            interval_seconds: None,
            reload: default_reload(),
            settle_cycles: default_settle_cycles(),
            report_existing: false,
            max_depth: default_max_depth(),
            use_hash: false,
            targets: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

/// `[deploy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDeploySection {
    /// `"single"` (default) or `"aggregated"`.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Single mode: artifact id (or `group:artifact`) of the application.
    #[serde(default)]
    pub project: Option<String>,

    /// Aggregated mode: applications left out.
    #[serde(default)]
    pub excluded_apps: Vec<String>,

    /// Bound on each container step; `0` means unbounded.
    #[serde(default = "default_step_timeout_seconds")]
    pub step_timeout_seconds: u64,

    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Shell command that serves one context.
    #[serde(default)]
    pub launch: String,

    /// Regex on the launch command's stdout that signals readiness.
    #[serde(default)]
    pub ready_on_stdout: Option<String>,

    /// Repository roots searched for external artifacts.
    #[serde(default)]
    pub repositories: Vec<PathBuf>,

    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_mode() -> String {
    "single".to_string()
}

fn default_step_timeout_seconds() -> u64 {
    60
}

fn default_manifest() -> PathBuf {
    PathBuf::from("Build.toml")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("target/hotdeploy")
}

impl Default for RawDeploySection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            project: None,
            excluded_apps: Vec::new(),
            step_timeout_seconds: default_step_timeout_seconds(),
            manifest: default_manifest(),
            launch: String::new(),
            ready_on_stdout: None,
            repositories: Vec::new(),
            work_dir: default_work_dir(),
        }
    }
}

/// `[classes]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClassesSection {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub scan_interval: Option<i64>,
    pub reload: Option<String>,
    pub aggregated: bool,
    pub exclude: Vec<String>,
}

impl RawConfigFile {
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(seconds) = overrides.scan_interval {
            self.scan.interval_seconds = Some(seconds);
        }
        if let Some(reload) = &overrides.reload {
            self.scan.reload = reload.clone();
        }
        if overrides.aggregated {
            self.deploy.mode = "aggregated".to_string();
        }
        self.deploy
            .excluded_apps
            .extend(overrides.exclude.iter().cloned());
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scan: ScanSettings,
    pub deploy: DeploySettings,
    pub classes_filter: Option<PathFilter>,
    pub external: Vec<ExternalSpec>,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// `Duration::ZERO` when scanning is disabled.
    pub interval: Duration,
    pub reload: ReloadMode,
    pub settle_cycles: u32,
    pub report_existing: bool,
    pub max_depth: usize,
    pub use_hash: bool,
    pub targets: Vec<PathBuf>,
    pub patterns: Vec<ScanPattern>,
}

impl ScanSettings {
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            interval: self.interval,
            settle_cycles: self.settle_cycles,
            report_existing: self.report_existing,
            use_hash: self.use_hash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub strategy: DeployStrategy,
    pub step_timeout: Option<Duration>,
    pub manifest: PathBuf,
    pub launch: String,
    pub ready_on_stdout: Option<Regex>,
    pub repositories: Vec<PathBuf>,
    pub work_dir: PathBuf,
}

impl ConfigFile {
    /// Resolve relative paths against `base` (the config file's directory).
    pub fn rebase(mut self, base: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };

        self.scan.targets = self.scan.targets.iter().map(join).collect();
        for pattern in &mut self.scan.patterns {
            pattern.directory = join(&pattern.directory);
        }
        self.deploy.manifest = join(&self.deploy.manifest);
        self.deploy.repositories = self.deploy.repositories.iter().map(join).collect();
        self.deploy.work_dir = join(&self.deploy.work_dir);
        self
    }
}
