// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;

use hotdeploy::config::{load_and_validate, load_with_overrides, ConfigOverrides};
use hotdeploy::errors::HotdeployError;
use hotdeploy::types::{DeployStrategy, ReloadMode};
use hotdeploy_test_utils::builders::ConfigFileBuilder;
use hotdeploy_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const FULL: &str = r#"
[scan]
interval_seconds = 2
reload = "automatic"
settle_cycles = 2
use_hash = true
targets = ["conf/app.properties"]

[[scan.patterns]]
directory = "src/main/resources"
includes = ["**/*.properties"]
excludes = ["**/tmp/**"]

[deploy]
mode = "aggregated"
excluded_apps = ["admin"]
manifest = "build/Build.toml"
launch = "java -jar server.jar"
ready_on_stdout = "Started .* in"
repositories = ["repo"]
step_timeout_seconds = 0

[classes]
excludes = ["**/*Test.class"]

[[external]]
context_path = "docs"
group_id = "org.acme"
artifact_id = "docs"
version = "2.0"
type = "war"
"#;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("Hotdeploy.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn full_config_is_loaded_and_rebased() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = load_and_validate(write_config(dir.path(), FULL))?;

    assert_eq!(cfg.scan.interval, Duration::from_secs(2));
    assert_eq!(cfg.scan.reload, ReloadMode::Automatic);
    assert_eq!(cfg.scan.settle_cycles, 2);
    assert!(cfg.scan.use_hash);
    assert_eq!(cfg.scan.targets, vec![dir.path().join("conf/app.properties")]);
    assert_eq!(
        cfg.scan.patterns[0].directory,
        dir.path().join("src/main/resources")
    );

    assert_eq!(
        cfg.deploy.strategy,
        DeployStrategy::Aggregated {
            excluded: vec!["admin".to_string()]
        }
    );
    assert_eq!(cfg.deploy.manifest, dir.path().join("build/Build.toml"));
    assert_eq!(cfg.deploy.repositories, vec![dir.path().join("repo")]);
    assert!(cfg.deploy.step_timeout.is_none());
    let ready = cfg.deploy.ready_on_stdout.as_ref().unwrap();
    assert!(ready.is_match("Started Server in 2.1s"));

    let filter = cfg.classes_filter.as_ref().unwrap();
    assert!(filter.matches("com/acme/Shop.class"));
    assert!(!filter.matches("com/acme/ShopTest.class"));

    assert_eq!(cfg.external.len(), 1);
    assert_eq!(cfg.external[0].coordinate.to_string(), "org.acme:docs:war:2.0");
    Ok(())
}

#[test]
fn manual_reload_from_the_command_line() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = write_config(dir.path(), "[deploy]\nlaunch = \"serve\"\n");

    let overrides = ConfigOverrides {
        reload: Some("manual".to_string()),
        ..ConfigOverrides::default()
    };
    let cfg = load_with_overrides(&path, &overrides)?;
    assert_eq!(cfg.scan.reload, ReloadMode::Manual);
    Ok(())
}

#[test]
fn invalid_files_are_rejected() -> TestResult {
    init_tracing();
    let cases = [
        "[deploy]\nlaunch = \"serve\"\nmode = \"everything\"\n",
        "[scan]\nreload = \"eventually\"\n[deploy]\nlaunch = \"serve\"\n",
        "[scan]\nsettle_cycles = 99\n[deploy]\nlaunch = \"serve\"\n",
        "[[scan.patterns]]\ndirectory = \"src\"\nincludes = [\"{unclosed\"]\n[deploy]\nlaunch = \"serve\"\n",
        "[deploy]\nlaunch = \"\"\n",
    ];
    for contents in cases {
        let dir = tempdir()?;
        let err = load_and_validate(write_config(dir.path(), contents)).unwrap_err();
        assert!(
            matches!(err, HotdeployError::ConfigError(_)),
            "expected config error for {contents:?}, got {err:?}"
        );
    }

    let dir = tempdir()?;
    let err = load_and_validate(write_config(dir.path(), "[scan\n")).unwrap_err();
    assert!(matches!(err, HotdeployError::TomlError(_)));
    Ok(())
}

#[test]
fn builder_defaults_validate() {
    let cfg = ConfigFileBuilder::new()
        .interval_seconds(0)
        .aggregated(&["admin"])
        .build();
    assert!(!cfg.scan.scanner_config().is_enabled());
    assert!(cfg.deploy.strategy.is_aggregated());
}
