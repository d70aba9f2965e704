// tests/build_provisioning.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotdeploy::deploy::{
    select_apps, AppConfigurator, BuildMetadata, BuildProvisioner, DirectoryOverlayMaterializer,
    Provisioner, TomlBuildMetadata, WatchOptions,
};
use hotdeploy::errors::HotdeployError;
use hotdeploy::fs::mock::MockFileSystem;
use hotdeploy::fs::FileSystem;
use hotdeploy::types::{AppId, DeployStrategy};
use hotdeploy::watch::{PathFilter, TargetKind, DEFAULT_MAX_DEPTH};
use hotdeploy_test_utils::builders::ManifestBuilder;
use hotdeploy_test_utils::fake_context::{ContextCall, RecordingContextFactory};
use hotdeploy_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// A build with a war `shop` depending on a sibling jar `model`, an external
/// library, a provided API and a war overlay.
fn seeded_build() -> MockFileSystem {
    let fs = MockFileSystem::new();
    let manifest = ManifestBuilder::new()
        .project("org.acme", "model", "jar", &[
            "base_dir = \"model\"",
            "output_dir = \"model/target/classes\"",
        ])
        .project("org.acme", "shop", "war", &[
            "base_dir = \"shop\"",
            "context_path = \"store\"",
        ])
        .dependency("org.acme", "model", "jar", &["file = \"repo/model-1.0.jar\""])
        .dependency("org.slf4j", "slf4j-api", "jar", &["file = \"repo/slf4j-api-1.0.jar\""])
        .dependency("javax.servlet", "servlet-api", "jar", &[
            "scope = \"provided\"",
            "file = \"repo/servlet-api-1.0.jar\"",
        ])
        .dependency("org.acme", "skin", "war", &["file = \"repo/skin-1.0\""])
        .build();
    fs.add_file("/ws/Build.toml", manifest);

    fs.add_file("/ws/model/target/classes/org/acme/Model.class", "m");
    fs.add_file("/ws/shop/src/main/webapp/WEB-INF/web.xml", "<web-app/>");
    fs.add_file("/ws/shop/src/main/webapp/WEB-INF/jetty-web.xml", "<Configure/>");
    fs.add_file("/ws/shop/target/classes/org/acme/Shop.class", "s");
    fs.add_file("/ws/repo/slf4j-api-1.0.jar", "jar");
    fs.add_file("/ws/repo/servlet-api-1.0.jar", "jar");
    fs.add_file("/ws/repo/skin-1.0/css/site.css", "body {}");
    fs
}

fn provisioner(
    fs: &MockFileSystem,
    factory: Arc<RecordingContextFactory>,
    watch: WatchOptions,
) -> BuildProvisioner {
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    BuildProvisioner::new(
        Arc::new(TomlBuildMetadata::new("/ws/Build.toml", Arc::clone(&shared))),
        AppConfigurator::new(
            Arc::clone(&shared),
            Arc::new(DirectoryOverlayMaterializer::new(Arc::clone(&shared))),
            "/ws/target/hotdeploy",
        ),
        factory,
        shared,
        watch,
    )
}

fn default_watch() -> WatchOptions {
    WatchOptions {
        max_depth: DEFAULT_MAX_DEPTH,
        ..WatchOptions::default()
    }
}

#[test]
fn provisions_settings_context_and_watch_set_from_the_manifest() -> TestResult {
    init_tracing();
    let fs = seeded_build();
    let factory = Arc::new(RecordingContextFactory::new());
    let provisioner = provisioner(&fs, Arc::clone(&factory), default_watch());

    let provisioned = provisioner.provision(&AppId::from("org.acme:shop"))?;
    let settings = &provisioned.settings;

    assert_eq!(settings.context_path, "/store");
    assert_eq!(settings.web_dir, PathBuf::from("/ws/shop/src/main/webapp"));
    assert_eq!(
        settings.descriptor.as_deref(),
        Some(Path::new("/ws/shop/src/main/webapp/WEB-INF/web.xml"))
    );
    assert_eq!(
        settings.classes_dir.as_deref(),
        Some(Path::new("/ws/shop/target/classes"))
    );
    // Sibling output instead of its jar; provided scope left out.
    assert_eq!(
        settings.classpath,
        vec![
            PathBuf::from("/ws/model/target/classes"),
            PathBuf::from("/ws/repo/slf4j-api-1.0.jar"),
        ]
    );
    // Web dir first, then the materialized overlay.
    assert_eq!(
        settings.base_resources,
        vec![
            PathBuf::from("/ws/shop/src/main/webapp"),
            PathBuf::from("/ws/target/hotdeploy/overlays/skin"),
        ]
    );
    assert!(fs.is_file(Path::new("/ws/target/hotdeploy/overlays/skin/css/site.css")));

    let targets: Vec<(TargetKind, PathBuf)> = provisioned
        .watch_set
        .iter()
        .map(|t| (t.kind(), t.path().to_path_buf()))
        .collect();
    assert_eq!(
        targets,
        vec![
            (TargetKind::File, PathBuf::from("/ws/shop/src/main/webapp/WEB-INF/web.xml")),
            (TargetKind::File, PathBuf::from("/ws/shop/src/main/webapp/WEB-INF/jetty-web.xml")),
            (TargetKind::File, PathBuf::from("/ws/Build.toml")),
            (TargetKind::Directory, PathBuf::from("/ws/shop/target/classes")),
            (TargetKind::Directory, PathBuf::from("/ws/model/target/classes")),
            (TargetKind::File, PathBuf::from("/ws/repo/slf4j-api-1.0.jar")),
        ]
    );

    assert!(!provisioned.context.is_running());
    assert_eq!(provisioned.context.context_path(), "/store");
    assert_eq!(
        factory.calls(),
        vec![ContextCall::Create {
            context_path: "/store".to_string(),
            instance: 1,
        }]
    );
    Ok(())
}

#[test]
fn classes_filter_and_extra_targets_apply_to_the_watch_set() -> TestResult {
    init_tracing();
    let fs = seeded_build();
    fs.add_file("/ws/conf/app.properties", "a=1");
    let watch = WatchOptions {
        extra_targets: vec![PathBuf::from("/ws/conf/app.properties")],
        patterns: Vec::new(),
        classes_filter: Some(PathFilter::new(&[], &["**/*Test.class".to_string()])?),
        max_depth: DEFAULT_MAX_DEPTH,
    };
    let provisioner = provisioner(&fs, Arc::new(RecordingContextFactory::new()), watch);

    let (_, watch_set) = provisioner.describe(&AppId::from("org.acme:shop"))?;
    assert!(watch_set.contains(Path::new("/ws/conf/app.properties")));

    let classes = watch_set
        .iter()
        .find(|t| t.path() == Path::new("/ws/shop/target/classes"))
        .expect("classes dir is watched");
    assert!(classes.accepts("org/acme/Shop.class"));
    assert!(!classes.accepts("org/acme/ShopTest.class"));
    Ok(())
}

#[test]
fn unknown_application_is_reported() {
    init_tracing();
    let fs = seeded_build();
    let provisioner = provisioner(&fs, Arc::new(RecordingContextFactory::new()), default_watch());
    let err = provisioner.provision(&AppId::from("org.acme:nope")).unwrap_err();
    assert!(matches!(err, HotdeployError::AppNotFound(_)));
}

#[test]
fn reprovisioning_sees_manifest_edits() -> TestResult {
    init_tracing();
    let fs = seeded_build();
    let provisioner = provisioner(&fs, Arc::new(RecordingContextFactory::new()), default_watch());
    let shop = AppId::from("org.acme:shop");

    let before = provisioner.provision(&shop)?;
    fs.add_file(
        "/ws/Build.toml",
        ManifestBuilder::new()
            .project("org.acme", "shop", "war", &[
                "base_dir = \"shop\"",
                "context_path = \"store\"",
                "override_descriptors = [\"shop/src/main/webapp/WEB-INF/override-web.xml\"]",
            ])
            .build(),
    );
    fs.add_file("/ws/shop/src/main/webapp/WEB-INF/override-web.xml", "<web-app/>");

    let after = provisioner.provision(&shop)?;
    assert_ne!(before.watch_set, after.watch_set);
    assert!(after
        .watch_set
        .contains(Path::new("/ws/shop/src/main/webapp/WEB-INF/override-web.xml")));
    assert!(after.settings.classpath.is_empty());
    Ok(())
}

#[test]
fn selection_follows_the_strategy() -> TestResult {
    let fs = seeded_build();
    let metadata = TomlBuildMetadata::new("/ws/Build.toml", Arc::new(fs));
    let projects = metadata.projects()?;

    let single = select_apps(&DeployStrategy::Single { project: None }, &projects)?;
    assert_eq!(single, vec![AppId::from("org.acme:shop")]);

    let excluded = select_apps(
        &DeployStrategy::Aggregated {
            excluded: vec!["shop".to_string()],
        },
        &projects,
    );
    assert!(matches!(excluded, Err(HotdeployError::ConfigError(_))));
    Ok(())
}
