// src/watch/patterns.rs

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

/// A directory plus include/exclude globs, as written in config:
///
/// ```toml
/// [[scan.patterns]]
/// directory = "src/main/resources"
/// includes = ["**/*.properties"]
/// excludes = ["**/tmp/**"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanPattern {
    pub directory: PathBuf,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Compiled include/exclude globs for one directory target.
///
/// Globs are matched against the path relative to the target directory
/// (e.g. `"com/acme/Foo.class"`). An empty include list accepts everything;
/// an exclude match always wins.
#[derive(Clone)]
pub struct PathFilter {
    includes: Vec<String>,
    excludes: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("includes", &self.includes)
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PathFilter {
    fn eq(&self, other: &Self) -> bool {
        self.includes == other.includes && self.excludes == other.excludes
    }
}

impl Eq for PathFilter {}

impl PathFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        let include_set = if includes.is_empty() {
            None
        } else {
            Some(build_globset(includes).context("building include globset")?)
        };
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(excludes).context("building exclude globset")?)
        };

        Ok(Self {
            includes: includes.to_vec(),
            excludes: excludes.to_vec(),
            include_set,
            exclude_set,
        })
    }

    pub fn from_pattern(pattern: &ScanPattern) -> Result<Self> {
        Self::new(&pattern.includes, &pattern.excludes).with_context(|| {
            format!("compiling scan pattern for {:?}", pattern.directory)
        })
    }

    /// True when the filter accepts nothing beyond the defaults.
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Returns true if a file at `rel_path` (relative to the target
    /// directory, forward slashes) counts toward change detection.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        match &self.include_set {
            Some(include) => include.is_match(rel_path),
            None => true,
        }
    }

    /// Whether a sub-directory at `rel_path` is excluded outright, so the
    /// walk can skip it instead of descending.
    pub fn prunes_dir(&self, rel_path: &str) -> bool {
        match &self.exclude_set {
            Some(exclude) => exclude.is_match(rel_path),
            None => false,
        }
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let pat = pat.strip_prefix("glob:").unwrap_or(pat);
        let glob = Glob::new(pat)
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = PathFilter::new(&[], &[]).unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches("com/acme/Foo.class"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter =
            PathFilter::new(&strings(&["**/*.class"]), &strings(&["**/generated/**"])).unwrap();
        assert!(filter.matches("com/acme/Foo.class"));
        assert!(!filter.matches("com/generated/Bar.class"));
        assert!(!filter.matches("com/acme/notes.txt"));
    }

    #[test]
    fn glob_prefix_is_accepted() {
        let filter = PathFilter::new(&strings(&["glob:**/*.xml"]), &[]).unwrap();
        assert!(filter.matches("WEB-INF/web.xml"));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(PathFilter::new(&strings(&["a/[b"]), &[]).is_err());
    }

    #[test]
    fn equality_ignores_compiled_sets() {
        let a = PathFilter::new(&strings(&["*.xml"]), &[]).unwrap();
        let b = PathFilter::new(&strings(&["*.xml"]), &[]).unwrap();
        let c = PathFilter::new(&strings(&["*.class"]), &[]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
