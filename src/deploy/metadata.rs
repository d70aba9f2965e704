// src/deploy/metadata.rs

//! Build metadata: the projects of a build, their outputs and dependencies.
//!
//! [`TomlBuildMetadata`] reads a manifest such as:
//!
//! ```toml
//! [[project]]
//! group_id = "org.acme"
//! artifact_id = "shop"
//! version = "1.0.0"
//! packaging = "war"
//! base_dir = "shop"
//! output_dir = "shop/target/classes"
//!
//! [[project.dependency]]
//! group_id = "org.acme"
//! artifact_id = "model"
//! version = "1.0.0"
//! file = "model/target/model-1.0.0.jar"
//! ```
//!
//! Every call re-reads the manifest, so a reconfiguration always sees the
//! current build state.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;
use crate::types::{AppId, DeployStrategy};

/// `group:artifact:type:version` identity of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default = "default_type", rename = "type")]
    pub kind: String,
}

fn default_type() -> String {
    "jar".to_string()
}

impl Coordinate {
    pub fn new(group_id: &str, artifact_id: &str, version: &str, kind: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn app_id(&self) -> AppId {
        AppId::new(&self.group_id, &self.artifact_id)
    }

    pub fn is_war(&self) -> bool {
        self.kind == "war"
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.kind, self.version
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl Scope {
    /// Provided and test dependencies never reach the deployed classpath.
    pub fn is_deployed(&self) -> bool {
        !matches!(self, Scope::Provided | Scope::Test)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub coordinate: Coordinate,
    pub scope: Scope,
    /// Resolved file of the dependency, if the build knows it.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub coordinate: Coordinate,
    pub base_dir: PathBuf,
    pub build_file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub webapp_dir: Option<PathBuf>,
    pub context_path: Option<String>,
    pub descriptor: Option<PathBuf>,
    pub override_descriptors: Vec<PathBuf>,
    pub dependencies: Vec<Dependency>,
}

impl Project {
    pub fn id(&self) -> AppId {
        self.coordinate.app_id()
    }

    pub fn artifact_id(&self) -> &str {
        &self.coordinate.artifact_id
    }

    pub fn is_war(&self) -> bool {
        self.coordinate.is_war()
    }
}

/// Source of project metadata.
pub trait BuildMetadata: Send + Sync + fmt::Debug {
    /// All projects of the build, dependencies before their dependents.
    fn projects(&self) -> Result<Vec<Project>>;
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    project: Vec<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    group_id: String,
    artifact_id: String,
    version: String,
    #[serde(default = "default_type")]
    packaging: String,
    #[serde(default)]
    base_dir: Option<PathBuf>,
    #[serde(default)]
    build_file: Option<PathBuf>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    webapp_dir: Option<PathBuf>,
    #[serde(default)]
    context_path: Option<String>,
    #[serde(default)]
    descriptor: Option<PathBuf>,
    #[serde(default)]
    override_descriptors: Vec<PathBuf>,
    #[serde(default)]
    dependency: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    #[serde(flatten)]
    coordinate: Coordinate,
    #[serde(default)]
    scope: Scope,
    #[serde(default)]
    file: Option<PathBuf>,
}

/// Build metadata backed by a TOML manifest.
#[derive(Debug, Clone)]
pub struct TomlBuildMetadata {
    manifest: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl TomlBuildMetadata {
    pub fn new(manifest: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            manifest: manifest.into(),
            fs,
        }
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    fn manifest_dir(&self) -> PathBuf {
        match self.manifest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl BuildMetadata for TomlBuildMetadata {
    fn projects(&self) -> Result<Vec<Project>> {
        let contents = self.fs.read_to_string(&self.manifest)?;
        let raw: RawManifest = toml::from_str(&contents)?;
        let root = self.manifest_dir();

        let projects: Vec<Project> = raw
            .project
            .into_iter()
            .map(|p| into_project(p, &root, &self.manifest))
            .collect();

        debug!(
            manifest = ?self.manifest,
            projects = projects.len(),
            "read build manifest"
        );
        order_projects(projects)
    }
}

fn into_project(raw: RawProject, root: &Path, manifest: &Path) -> Project {
    let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

    Project {
        coordinate: Coordinate {
            group_id: raw.group_id,
            artifact_id: raw.artifact_id,
            version: raw.version,
            kind: raw.packaging,
        },
        base_dir: raw.base_dir.map(resolve).unwrap_or_else(|| root.to_path_buf()),
        build_file: raw
            .build_file
            .map(resolve)
            .unwrap_or_else(|| manifest.to_path_buf()),
        output_dir: raw.output_dir.map(resolve),
        webapp_dir: raw.webapp_dir.map(resolve),
        context_path: raw.context_path,
        descriptor: raw.descriptor.map(resolve),
        override_descriptors: raw.override_descriptors.into_iter().map(resolve).collect(),
        dependencies: raw
            .dependency
            .into_iter()
            .map(|d| Dependency {
                coordinate: d.coordinate,
                scope: d.scope,
                file: d.file.map(resolve),
            })
            .collect(),
    }
}

/// Reject duplicate ids and dependency cycles between local projects, and
/// return the projects with dependencies first.
pub fn order_projects(projects: Vec<Project>) -> Result<Vec<Project>> {
    let mut index: HashMap<AppId, usize> = HashMap::new();
    for (i, project) in projects.iter().enumerate() {
        if index.insert(project.id(), i).is_some() {
            return Err(HotdeployError::ConfigError(format!(
                "project '{}' is declared more than once",
                project.id()
            )));
        }
    }

    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..projects.len() {
        graph.add_node(i);
    }
    for (i, project) in projects.iter().enumerate() {
        for dep in &project.dependencies {
            if let Some(&j) = index.get(&dep.coordinate.app_id()) {
                graph.add_edge(j, i, ());
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        HotdeployError::ConfigError(format!(
            "dependency cycle between local projects involving '{}'",
            projects[cycle.node_id()].id()
        ))
    })?;

    let mut slots: Vec<Option<Project>> = projects.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Applications to deploy under `strategy`, in project order.
///
/// Single mode takes the named project (artifact id or `group:artifact`),
/// or the first war when none is named. Aggregated mode takes every war
/// not excluded by artifact id or full id.
pub fn select_apps(strategy: &DeployStrategy, projects: &[Project]) -> Result<Vec<AppId>> {
    match strategy {
        DeployStrategy::Single { project: Some(name) } => projects
            .iter()
            .find(|p| p.artifact_id() == name || p.id().as_str() == name)
            .map(|p| vec![p.id()])
            .ok_or_else(|| {
                HotdeployError::ConfigError(format!("no project named '{name}' in the build"))
            }),
        DeployStrategy::Single { project: None } => projects
            .iter()
            .find(|p| p.is_war())
            .map(|p| vec![p.id()])
            .ok_or_else(|| HotdeployError::ConfigError("the build has no war project".to_string())),
        DeployStrategy::Aggregated { excluded } => {
            let apps: Vec<AppId> = projects
                .iter()
                .filter(|p| p.is_war())
                .filter(|p| {
                    !excluded
                        .iter()
                        .any(|e| e == p.artifact_id() || e == p.id().as_str())
                })
                .map(Project::id)
                .collect();
            if apps.is_empty() {
                return Err(HotdeployError::ConfigError(
                    "no war project left to deploy after exclusions".to_string(),
                ));
            }
            Ok(apps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const MANIFEST: &str = r#"
[[project]]
group_id = "org.acme"
artifact_id = "shop"
version = "1.0.0"
packaging = "war"
base_dir = "shop"
output_dir = "shop/target/classes"

[[project.dependency]]
group_id = "org.acme"
artifact_id = "model"
version = "1.0.0"
file = "model/target/model-1.0.0.jar"

[[project.dependency]]
group_id = "javax.servlet"
artifact_id = "servlet-api"
version = "3.1"
scope = "provided"

[[project]]
group_id = "org.acme"
artifact_id = "model"
version = "1.0.0"
base_dir = "model"
build_file = "model/build.toml"
"#;

    #[test]
    fn manifest_paths_resolve_against_its_directory() {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/Build.toml", MANIFEST);
        let meta = TomlBuildMetadata::new("/ws/Build.toml", Arc::new(fs));

        let projects = meta.projects().unwrap();
        let ids: Vec<_> = projects.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["org.acme:model", "org.acme:shop"]);

        let shop = &projects[1];
        assert!(shop.is_war());
        assert_eq!(shop.base_dir, PathBuf::from("/ws/shop"));
        assert_eq!(shop.build_file, PathBuf::from("/ws/Build.toml"));
        assert_eq!(shop.output_dir.as_deref(), Some(Path::new("/ws/shop/target/classes")));
        assert_eq!(
            shop.dependencies[0].file.as_deref(),
            Some(Path::new("/ws/model/target/model-1.0.0.jar"))
        );
        assert_eq!(shop.dependencies[1].scope, Scope::Provided);
        assert_eq!(projects[0].build_file, PathBuf::from("/ws/model/build.toml"));
    }

    #[test]
    fn cycle_between_local_projects_is_rejected() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/ws/Build.toml",
            r#"
[[project]]
group_id = "g"
artifact_id = "a"
version = "1"
[[project.dependency]]
group_id = "g"
artifact_id = "b"
version = "1"

[[project]]
group_id = "g"
artifact_id = "b"
version = "1"
[[project.dependency]]
group_id = "g"
artifact_id = "a"
version = "1"
"#,
        );
        let meta = TomlBuildMetadata::new("/ws/Build.toml", Arc::new(fs));
        let err = meta.projects().unwrap_err();
        assert!(matches!(err, HotdeployError::ConfigError(msg) if msg.contains("cycle")));
    }

    #[test]
    fn duplicate_project_is_rejected() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/ws/Build.toml",
            r#"
[[project]]
group_id = "g"
artifact_id = "a"
version = "1"

[[project]]
group_id = "g"
artifact_id = "a"
version = "2"
"#,
        );
        let meta = TomlBuildMetadata::new("/ws/Build.toml", Arc::new(fs));
        assert!(matches!(meta.projects(), Err(HotdeployError::ConfigError(_))));
    }
    fn war(artifact: &str) -> Project {
        Project {
            coordinate: Coordinate::new("g", artifact, "1", "war"),
            base_dir: PathBuf::from("/ws"),
            build_file: PathBuf::from("/ws/Build.toml"),
            output_dir: None,
            webapp_dir: None,
            context_path: None,
            descriptor: None,
            override_descriptors: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn single_mode_picks_named_or_first_war() {
        let mut lib = war("lib");
        lib.coordinate.kind = "jar".to_string();
        let projects = vec![lib, war("shop"), war("admin")];

        let first = select_apps(&DeployStrategy::Single { project: None }, &projects).unwrap();
        assert_eq!(first, vec![AppId::from("g:shop")]);

        let named = DeployStrategy::Single {
            project: Some("g:admin".to_string()),
        };
        assert_eq!(select_apps(&named, &projects).unwrap(), vec![AppId::from("g:admin")]);

        let missing = DeployStrategy::Single {
            project: Some("nope".to_string()),
        };
        assert!(matches!(
            select_apps(&missing, &projects),
            Err(HotdeployError::ConfigError(_))
        ));
    }

    #[test]
    fn aggregated_mode_takes_wars_minus_exclusions() {
        let projects = vec![war("shop"), war("admin"), war("docs")];
        let strategy = DeployStrategy::Aggregated {
            excluded: vec!["admin".to_string()],
        };
        assert_eq!(
            select_apps(&strategy, &projects).unwrap(),
            vec![AppId::from("g:shop"), AppId::from("g:docs")]
        );

        let all_out = DeployStrategy::Aggregated {
            excluded: vec!["shop".into(), "admin".into(), "g:docs".into()],
        };
        assert!(select_apps(&all_out, &projects).is_err());
    }
}
