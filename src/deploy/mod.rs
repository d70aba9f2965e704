// src/deploy/mod.rs

//! Collaborators of the orchestrator: where applications come from and how
//! they are served.
//!
//! - [`metadata`] reads the projects of the build.
//! - [`configure`] derives per-application settings from a project.
//! - [`provision`] turns settings into a context and a watch set.
//! - [`context`] and [`process`] define and implement container contexts.
//! - [`resolver`], [`overlay`] and [`external`] handle artifacts that do not
//!   come from the build's own projects.

pub mod configure;
pub mod context;
pub mod external;
pub mod metadata;
pub mod overlay;
pub mod process;
pub mod provision;
pub mod resolver;

pub use configure::{AppConfigurator, AppSettings};
pub use context::{ContainerContext, ContextFactory, LifecycleFuture};
pub use external::{ExternalDeployer, ExternalSpec};
pub use metadata::{
    order_projects, select_apps, BuildMetadata, Coordinate, Dependency, Project, Scope,
    TomlBuildMetadata,
};
pub use overlay::{DirectoryOverlayMaterializer, OverlayMaterializer};
pub use process::{ProcessContext, ProcessContextFactory};
pub use provision::{BuildProvisioner, Provisioned, Provisioner, WatchOptions};
pub use resolver::{ArtifactResolver, LocalRepositoryResolver};
