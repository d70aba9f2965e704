use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How redeploys are initiated.
///
/// - `Automatic`: scanners poll the watch sets and redeploy on change
///   (default behaviour).
/// - `Manual`: no polling; redeploys only happen when requested on the
///   console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    #[default]
    Automatic,
    Manual,
}

impl FromStr for ReloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "automatic" => Ok(ReloadMode::Automatic),
            "manual" => Ok(ReloadMode::Manual),
            other => Err(format!(
                "invalid reload mode: {other} (expected \"automatic\" or \"manual\")"
            )),
        }
    }
}

impl fmt::Display for ReloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadMode::Automatic => f.write_str("automatic"),
            ReloadMode::Manual => f.write_str("manual"),
        }
    }
}

/// Which build projects become managed applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStrategy {
    /// Exactly one application. `project` selects it by artifact id; when
    /// `None`, the first `war` project of the manifest is used.
    Single { project: Option<String> },
    /// Every `war` project except the excluded artifact ids, each with its
    /// own scanner and redeploy state.
    Aggregated { excluded: Vec<String> },
}

impl DeployStrategy {
    pub fn is_aggregated(&self) -> bool {
        matches!(self, DeployStrategy::Aggregated { .. })
    }
}

/// Logical identity of a managed application.
///
/// Build projects are keyed `group:artifact`; external artifact contexts are
/// keyed `external:<context path>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(group_id: &str, artifact_id: &str) -> Self {
        Self(format!("{group_id}:{artifact_id}"))
    }

    pub fn external(context_path: &str) -> Self {
        Self(format!("external:{context_path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The artifact part of a `group:artifact` id.
    pub fn artifact(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
