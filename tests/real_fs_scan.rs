// tests/real_fs_scan.rs

use std::error::Error;
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use hotdeploy::fs::RealFileSystem;
use hotdeploy::types::AppId;
use hotdeploy::watch::{
    ChangeKind, ClassDir, PathFilter, ScanCore, ScannerConfig, WatchInputs, WatchSetBuilder,
    DEFAULT_MAX_DEPTH,
};
use hotdeploy_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn content_changes_on_disk_settle_into_a_batch() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let web_inf = dir.path().join("webapp/WEB-INF");
    let classes = web_inf.join("classes/com/acme");
    fs::create_dir_all(&classes)?;
    fs::write(web_inf.join("web.xml"), "<web-app/>")?;
    fs::write(classes.join("A.class"), "a")?;
    fs::write(classes.join("ATest.class"), "t")?;

    let inputs = WatchInputs {
        descriptors: vec![web_inf.join("web.xml")],
        class_dirs: vec![ClassDir {
            path: web_inf.join("classes"),
            filter: Some(PathFilter::new(&[], &["**/*Test.class".to_string()])?),
        }],
        ..WatchInputs::default()
    };
    let watch_set = WatchSetBuilder::new(Arc::new(RealFileSystem), DEFAULT_MAX_DEPTH).build(&inputs)?;
    assert_eq!(watch_set.len(), 2);

    // Hashing makes same-size rewrites within one mtime tick visible.
    let config = ScannerConfig {
        use_hash: true,
        ..ScannerConfig::default()
    };
    let mut core = ScanCore::new(AppId::from("g:shop"), watch_set, &config, Arc::new(RealFileSystem));
    assert!(core.cycle().is_none());

    fs::write(classes.join("A.class"), "b")?;
    fs::write(classes.join("ATest.class"), "u")?;
    fs::write(classes.join("B.class"), "b")?;

    assert!(core.cycle().is_none());
    let batch = core.cycle().expect("changes settle after one quiet cycle");
    assert_eq!(batch.len(), 2);
    let a = fs::canonicalize(classes.join("A.class"))?;
    let b = fs::canonicalize(classes.join("B.class"))?;
    assert_eq!(batch.kind_of(&a), Some(ChangeKind::Modified));
    assert_eq!(batch.kind_of(&b), Some(ChangeKind::Added));

    fs::remove_file(classes.join("B.class"))?;
    assert!(core.cycle().is_none());
    let batch = core.cycle().expect("removal settles");
    assert_eq!(batch.kind_of(&b), Some(ChangeKind::Removed));
    Ok(())
}

#[test]
fn missing_target_appearing_later_is_added() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let web_inf = dir.path().join("WEB-INF");
    fs::create_dir_all(&web_inf)?;
    let override_xml = web_inf.join("override-web.xml");

    let mut watch_set = hotdeploy::watch::WatchSet::new();
    watch_set.push(hotdeploy::watch::WatchTarget::file(&override_xml));

    let mut core = ScanCore::new(
        AppId::from("g:shop"),
        watch_set,
        &ScannerConfig::default(),
        Arc::new(RealFileSystem),
    );
    assert!(core.cycle().is_none());

    fs::write(&override_xml, "<web-app/>")?;
    assert!(core.cycle().is_none());
    let batch = core.cycle().expect("new file settles");
    assert_eq!(batch.kind_of(&override_xml), Some(ChangeKind::Added));
    Ok(())
}
